use std::str::FromStr;

use rand::Rng;
use recall_core::Group;

/// How a participant's group is chosen at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupAssignment {
    Manual(Group),
    Random,
}

impl GroupAssignment {
    pub fn assign<R: Rng + ?Sized>(&self, rng: &mut R) -> Group {
        match self {
            Self::Manual(group) => *group,
            Self::Random => Group::ALL[rng.random_range(0..Group::ALL.len())],
        }
    }
}

impl FromStr for GroupAssignment {
    type Err = String;

    /// `1`, `2`, `3` or `random`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("random") {
            return Ok(Self::Random);
        }
        s.parse::<u8>()
            .ok()
            .and_then(Group::from_number)
            .map(Self::Manual)
            .ok_or_else(|| format!("expected 1, 2, 3 or `random`, got `{s}`"))
    }
}
