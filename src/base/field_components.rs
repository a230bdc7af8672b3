use super::Field;
use crate::StrError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maps the physical fields to vector-component indices of the DOF space
///
/// The indices are distinct and within `[0, n_components)`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
pub struct FieldComponentMap {
    solid_potential: usize,
    liquid_potential: usize,
    temperature: usize,
    n_components: usize,
}

impl FieldComponentMap {
    /// Allocates a new instance
    ///
    /// # Input
    ///
    /// * `solid_potential` -- component index of the solid potential
    /// * `liquid_potential` -- component index of the liquid potential
    /// * `temperature` -- component index of the temperature
    /// * `n_components` -- number of components of the DOF space
    pub fn new(
        solid_potential: usize,
        liquid_potential: usize,
        temperature: usize,
        n_components: usize,
    ) -> Result<Self, StrError> {
        if solid_potential >= n_components {
            return Err("solid_potential_component is out of range");
        }
        if liquid_potential >= n_components {
            return Err("liquid_potential_component is out of range");
        }
        if temperature >= n_components {
            return Err("temperature_component is out of range");
        }
        if solid_potential == liquid_potential || solid_potential == temperature || liquid_potential == temperature {
            return Err("field components must be distinct");
        }
        Ok(FieldComponentMap {
            solid_potential,
            liquid_potential,
            temperature,
            n_components,
        })
    }

    /// Returns the component index of a field
    pub fn component(&self, field: Field) -> usize {
        match field {
            Field::SolidPotential => self.solid_potential,
            Field::LiquidPotential => self.liquid_potential,
            Field::Temperature => self.temperature,
        }
    }

    /// Returns the number of components of the DOF space
    pub fn n_components(&self) -> usize {
        self.n_components
    }

    /// Checks that the map is compatible with a DOF space
    pub fn check(&self, n_components: usize) -> Result<(), StrError> {
        if self.n_components != n_components {
            return Err("number of components does not match the DOF topology");
        }
        Ok(())
    }
}

impl fmt::Display for FieldComponentMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for field in [Field::SolidPotential, Field::LiquidPotential, Field::Temperature] {
            write!(f, "{} = {}\n", field.key(), self.component(field))?;
        }
        write!(f, "n_components = {}\n", self.n_components)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::FieldComponentMap;
    use crate::base::Field;

    #[test]
    fn new_handles_errors() {
        assert_eq!(
            FieldComponentMap::new(3, 1, 2, 3).err(),
            Some("solid_potential_component is out of range")
        );
        assert_eq!(
            FieldComponentMap::new(0, 3, 2, 3).err(),
            Some("liquid_potential_component is out of range")
        );
        assert_eq!(
            FieldComponentMap::new(0, 1, 5, 3).err(),
            Some("temperature_component is out of range")
        );
        assert_eq!(
            FieldComponentMap::new(0, 0, 2, 3).err(),
            Some("field components must be distinct")
        );
        assert_eq!(
            FieldComponentMap::new(0, 1, 1, 3).err(),
            Some("field components must be distinct")
        );
    }

    #[test]
    fn new_works() {
        let map = FieldComponentMap::new(2, 0, 1, 3).unwrap();
        assert_eq!(map.component(Field::SolidPotential), 2);
        assert_eq!(map.component(Field::LiquidPotential), 0);
        assert_eq!(map.component(Field::Temperature), 1);
        assert_eq!(map.n_components(), 3);
        assert_eq!(map.check(3), Ok(()));
        assert_eq!(map.check(4).err(), Some("number of components does not match the DOF topology"));
        assert_eq!(
            format!("{}", map),
            "solid_potential_component = 2\n\
             liquid_potential_component = 0\n\
             temperature_component = 1\n\
             n_components = 3\n"
        );
    }
}
