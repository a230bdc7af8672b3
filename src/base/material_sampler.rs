use crate::StrError;
use gemlab::mesh::{Cell, CellAttribute};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Defines the material coefficients sampled at the quadrature points
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Deserialize, Serialize)]
pub enum Coefficient {
    /// Double-layer capacitance per unit volume
    SpecificCapacitance,

    /// Electrical conductivity of the solid phase
    SolidConductivity,

    /// Electrical conductivity of the liquid phase (electrolyte)
    LiquidConductivity,

    /// Rate coefficient of the charge-transfer (Faradaic) reaction
    FaradaicReactionCoefficient,
}

impl Coefficient {
    /// Returns the field name of the coefficient
    pub fn name(&self) -> &'static str {
        match self {
            Coefficient::SpecificCapacitance => "specific_capacitance",
            Coefficient::SolidConductivity => "solid_electrical_conductivity",
            Coefficient::LiquidConductivity => "liquid_electrical_conductivity",
            Coefficient::FaradaicReactionCoefficient => "faradaic_reaction_coefficient",
        }
    }

    /// Returns the coefficient corresponding to a field name
    pub fn from_name(name: &str) -> Result<Self, StrError> {
        match name {
            "specific_capacitance" => Ok(Coefficient::SpecificCapacitance),
            "solid_electrical_conductivity" => Ok(Coefficient::SolidConductivity),
            "liquid_electrical_conductivity" => Ok(Coefficient::LiquidConductivity),
            "faradaic_reaction_coefficient" => Ok(Coefficient::FaradaicReactionCoefficient),
            _ => Err("unknown material field name"),
        }
    }
}

/// Supplies material coefficients at the quadrature points of a cell
///
/// The values may be zero, which silences the corresponding term of the
/// bilinear form (e.g., no liquid conductivity inside a current collector).
pub trait MaterialSampler: Sync {
    /// Returns the values of a coefficient at the quadrature points of a cell
    ///
    /// The returned array must have length equal to `n_points`.
    fn get_values(&self, coefficient: Coefficient, cell: &Cell, n_points: usize) -> Result<Vec<f64>, StrError>;
}

/// Implements a piecewise-constant material sampler keyed by cell attribute (material id)
///
/// Coefficients that are not given for a registered material are zero.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct MaterialTable {
    materials: HashMap<CellAttribute, HashMap<Coefficient, f64>>,
}

impl MaterialTable {
    /// Allocates a new (empty) instance
    pub fn new() -> Self {
        MaterialTable {
            materials: HashMap::new(),
        }
    }

    /// Sets the value of a coefficient for a material
    pub fn set(&mut self, attribute: CellAttribute, coefficient: Coefficient, value: f64) -> &mut Self {
        self.materials.entry(attribute).or_default().insert(coefficient, value);
        self
    }

    /// Sets the same coefficients for a material
    pub fn set_all(&mut self, attribute: CellAttribute, values: &[(Coefficient, f64)]) -> &mut Self {
        for (coefficient, value) in values {
            self.set(attribute, *coefficient, *value);
        }
        self
    }

    /// Returns the value of a coefficient for a material
    pub fn value(&self, attribute: CellAttribute, coefficient: Coefficient) -> Result<f64, StrError> {
        let material = self
            .materials
            .get(&attribute)
            .ok_or("cannot find CellAttribute in MaterialTable")?;
        Ok(*material.get(&coefficient).unwrap_or(&0.0))
    }
}

impl MaterialSampler for MaterialTable {
    fn get_values(&self, coefficient: Coefficient, cell: &Cell, n_points: usize) -> Result<Vec<f64>, StrError> {
        let value = self.value(cell.attribute, coefficient)?;
        Ok(vec![value; n_points])
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::{Coefficient, MaterialSampler, MaterialTable};
    use gemlab::mesh::Cell;
    use gemlab::shapes::GeoKind;

    #[test]
    fn coefficient_names_work() {
        for c in [
            Coefficient::SpecificCapacitance,
            Coefficient::SolidConductivity,
            Coefficient::LiquidConductivity,
            Coefficient::FaradaicReactionCoefficient,
        ] {
            assert_eq!(Coefficient::from_name(c.name()), Ok(c));
        }
        assert_eq!(
            Coefficient::from_name("thermal_conductivity").err(),
            Some("unknown material field name")
        );
    }

    #[test]
    fn material_table_works() {
        //  electrode: 1   separator: 2
        let mut table = MaterialTable::new();
        table
            .set_all(
                1,
                &[
                    (Coefficient::SpecificCapacitance, 86.0e6),
                    (Coefficient::SolidConductivity, 52.1),
                    (Coefficient::LiquidConductivity, 0.067),
                ],
            )
            .set(2, Coefficient::LiquidConductivity, 0.067);
        let electrode = Cell {
            id: 0,
            attribute: 1,
            kind: GeoKind::Qua4,
            points: vec![0, 1, 2, 3],
        };
        let separator = Cell {
            id: 1,
            attribute: 2,
            kind: GeoKind::Qua4,
            points: vec![1, 4, 5, 2],
        };
        let unknown = Cell {
            id: 2,
            attribute: 9,
            kind: GeoKind::Qua4,
            points: vec![4, 6, 7, 5],
        };
        assert_eq!(
            table.get_values(Coefficient::SolidConductivity, &electrode, 4).unwrap(),
            &[52.1, 52.1, 52.1, 52.1]
        );
        assert_eq!(
            table.get_values(Coefficient::SolidConductivity, &separator, 4).unwrap(),
            &[0.0, 0.0, 0.0, 0.0]
        );
        assert_eq!(
            table.get_values(Coefficient::FaradaicReactionCoefficient, &electrode, 3).unwrap(),
            &[0.0, 0.0, 0.0]
        );
        assert_eq!(
            table.get_values(Coefficient::LiquidConductivity, &unknown, 4).err(),
            Some("cannot find CellAttribute in MaterialTable")
        );
    }
}
