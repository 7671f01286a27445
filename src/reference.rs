use std::fmt::{Display, Formatter};
use std::ops::Neg;

/// Edge to a BDD node. A negative value is a complemented edge.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Ref(i32);

impl Ref {
    pub const fn positive(id: u32) -> Self {
        Self(id as i32)
    }

    pub const fn negative(id: u32) -> Self {
        Self(-(id as i32))
    }

    pub const fn is_negated(self) -> bool {
        self.0 < 0
    }

    pub const fn negate(self) -> Self {
        Self(-self.0)
    }

    /// Node id, without the complement bit.
    pub const fn id(self) -> u32 {
        self.0.unsigned_abs()
    }

    /// Node id as an index into the node table.
    pub const fn index(self) -> usize {
        self.0.unsigned_abs() as usize
    }

    /// The edge without its complement bit.
    pub const fn regular(self) -> Self {
        Self(self.0.abs())
    }
}

impl Neg for Ref {
    type Output = Self;

    fn neg(self) -> Self::Output {
        self.negate()
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", if self.is_negated() { "~" } else { "" }, self.id())
    }
}
