// Relationship cardinality between two resource attributes

use serde::{Deserialize, Serialize};

/// Cardinality of a relationship, seen from the declaring attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Multiplicity {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Multiplicity {
    /// Cardinality of the synthesized reverse attribute.
    ///
    /// An involution: `1:1` and `N:N` are fixed points, `1:N` and `N:1`
    /// swap.
    pub fn reverse(self) -> Self {
        match self {
            Multiplicity::OneToOne => Multiplicity::OneToOne,
            Multiplicity::OneToMany => Multiplicity::ManyToOne,
            Multiplicity::ManyToOne => Multiplicity::OneToMany,
            Multiplicity::ManyToMany => Multiplicity::ManyToMany,
        }
    }

    /// Whether an attribute with this multiplicity holds a collection
    pub fn is_collection(self) -> bool {
        matches!(self, Multiplicity::OneToMany | Multiplicity::ManyToMany)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Multiplicity; 4] = [
        Multiplicity::OneToOne,
        Multiplicity::OneToMany,
        Multiplicity::ManyToOne,
        Multiplicity::ManyToMany,
    ];

    #[test]
    fn test_reverse_involution() {
        for m in ALL {
            assert_eq!(m.reverse().reverse(), m);
        }
    }

    #[test]
    fn test_reverse_swaps_one_to_many() {
        assert_eq!(Multiplicity::OneToMany.reverse(), Multiplicity::ManyToOne);
        assert_eq!(Multiplicity::ManyToOne.reverse(), Multiplicity::OneToMany);
        assert_eq!(Multiplicity::OneToOne.reverse(), Multiplicity::OneToOne);
        assert_eq!(Multiplicity::ManyToMany.reverse(), Multiplicity::ManyToMany);
    }

    #[test]
    fn test_is_collection() {
        assert!(!Multiplicity::OneToOne.is_collection());
        assert!(Multiplicity::OneToMany.is_collection());
        assert!(!Multiplicity::ManyToOne.is_collection());
        assert!(Multiplicity::ManyToMany.is_collection());
    }
}
