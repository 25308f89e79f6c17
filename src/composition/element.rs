//! Periodic table data used for formula parsing and canonical ordering
//!
//! Atomic weights are IUPAC standard values (abridged). Electronegativities
//! are Pauling values; noble gases without a defined value sort last.

use std::cmp::Ordering;
use std::fmt;

/// (symbol, atomic weight, Pauling electronegativity) indexed by Z - 1
const TABLE: [(&str, f64, f64); 94] = [
    ("H", 1.008, 2.20),
    ("He", 4.002_602, f64::INFINITY),
    ("Li", 6.94, 0.98),
    ("Be", 9.012_183, 1.57),
    ("B", 10.81, 2.04),
    ("C", 12.011, 2.55),
    ("N", 14.007, 3.04),
    ("O", 15.999, 3.44),
    ("F", 18.998_403, 3.98),
    ("Ne", 20.1797, f64::INFINITY),
    ("Na", 22.989_769, 0.93),
    ("Mg", 24.305, 1.31),
    ("Al", 26.981_538, 1.61),
    ("Si", 28.085, 1.90),
    ("P", 30.973_762, 2.19),
    ("S", 32.06, 2.58),
    ("Cl", 35.45, 3.16),
    ("Ar", 39.948, f64::INFINITY),
    ("K", 39.0983, 0.82),
    ("Ca", 40.078, 1.00),
    ("Sc", 44.955_908, 1.36),
    ("Ti", 47.867, 1.54),
    ("V", 50.9415, 1.63),
    ("Cr", 51.9961, 1.66),
    ("Mn", 54.938_044, 1.55),
    ("Fe", 55.845, 1.83),
    ("Co", 58.933_194, 1.88),
    ("Ni", 58.6934, 1.91),
    ("Cu", 63.546, 1.90),
    ("Zn", 65.38, 1.65),
    ("Ga", 69.723, 1.81),
    ("Ge", 72.630, 2.01),
    ("As", 74.921_595, 2.18),
    ("Se", 78.971, 2.55),
    ("Br", 79.904, 2.96),
    ("Kr", 83.798, 3.00),
    ("Rb", 85.4678, 0.82),
    ("Sr", 87.62, 0.95),
    ("Y", 88.905_84, 1.22),
    ("Zr", 91.224, 1.33),
    ("Nb", 92.906_37, 1.60),
    ("Mo", 95.95, 2.16),
    ("Tc", 98.0, 1.90),
    ("Ru", 101.07, 2.20),
    ("Rh", 102.905_50, 2.28),
    ("Pd", 106.42, 2.20),
    ("Ag", 107.8682, 1.93),
    ("Cd", 112.414, 1.69),
    ("In", 114.818, 1.78),
    ("Sn", 118.710, 1.96),
    ("Sb", 121.760, 2.05),
    ("Te", 127.60, 2.10),
    ("I", 126.904_47, 2.66),
    ("Xe", 131.293, 2.60),
    ("Cs", 132.905_452, 0.79),
    ("Ba", 137.327, 0.89),
    ("La", 138.905_47, 1.10),
    ("Ce", 140.116, 1.12),
    ("Pr", 140.907_66, 1.13),
    ("Nd", 144.242, 1.14),
    ("Pm", 145.0, 1.13),
    ("Sm", 150.36, 1.17),
    ("Eu", 151.964, 1.20),
    ("Gd", 157.25, 1.20),
    ("Tb", 158.925_35, 1.10),
    ("Dy", 162.500, 1.22),
    ("Ho", 164.930_33, 1.23),
    ("Er", 167.259, 1.24),
    ("Tm", 168.934_22, 1.25),
    ("Yb", 173.045, 1.10),
    ("Lu", 174.9668, 1.27),
    ("Hf", 178.49, 1.30),
    ("Ta", 180.947_88, 1.50),
    ("W", 183.84, 2.36),
    ("Re", 186.207, 1.90),
    ("Os", 190.23, 2.20),
    ("Ir", 192.217, 2.20),
    ("Pt", 195.084, 2.28),
    ("Au", 196.966_569, 2.54),
    ("Hg", 200.592, 2.00),
    ("Tl", 204.38, 1.62),
    ("Pb", 207.2, 2.33),
    ("Bi", 208.980_40, 2.02),
    ("Po", 209.0, 2.00),
    ("At", 210.0, 2.20),
    ("Rn", 222.0, f64::INFINITY),
    ("Fr", 223.0, 0.70),
    ("Ra", 226.0, 0.90),
    ("Ac", 227.0, 1.10),
    ("Th", 232.0377, 1.30),
    ("Pa", 231.035_88, 1.50),
    ("U", 238.028_91, 1.38),
    ("Np", 237.0, 1.36),
    ("Pu", 244.0, 1.28),
];

/// A chemical element, identified by atomic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(u8);

impl Element {
    /// Carbon
    pub const CARBON: Self = Self(6);
    /// Oxygen
    pub const OXYGEN: Self = Self(8);

    /// Look up an element by its symbol (case-sensitive).
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        TABLE
            .iter()
            .position(|(s, _, _)| *s == symbol)
            .and_then(|idx| u8::try_from(idx + 1).ok())
            .map(Self)
    }

    /// Atomic number.
    #[must_use]
    pub const fn atomic_number(self) -> u8 {
        self.0
    }

    fn entry(self) -> &'static (&'static str, f64, f64) {
        &TABLE[usize::from(self.0) - 1]
    }

    /// Element symbol, e.g. `"Cu"`.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        self.entry().0
    }

    /// Standard atomic weight in g/mol.
    #[must_use]
    pub fn atomic_weight(self) -> f64 {
        self.entry().1
    }

    /// Pauling electronegativity (infinite for noble gases).
    #[must_use]
    pub fn electronegativity(self) -> f64 {
        self.entry().2
    }

    /// Ordering used when writing canonical formulas: electropositive
    /// elements first, ties broken by symbol.
    #[must_use]
    pub fn formula_order(self, other: Self) -> Ordering {
        self.electronegativity()
            .total_cmp(&other.electronegativity())
            .then_with(|| self.symbol().cmp(other.symbol()))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_lookup() {
        let cu = Element::from_symbol("Cu").unwrap();
        assert_eq!(cu.atomic_number(), 29);
        assert_eq!(cu.symbol(), "Cu");
        assert!((cu.atomic_weight() - 63.546).abs() < 1e-9);
        assert!(Element::from_symbol("Xx").is_none());
        assert!(Element::from_symbol("cu").is_none());
    }

    #[test]
    fn test_formula_order() {
        let ba = Element::from_symbol("Ba").unwrap();
        let o = Element::from_symbol("O").unwrap();
        let he = Element::from_symbol("He").unwrap();
        assert_eq!(ba.formula_order(o), Ordering::Less);
        assert_eq!(he.formula_order(o), Ordering::Greater);
    }
}
