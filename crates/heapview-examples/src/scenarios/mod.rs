pub mod friends;
pub mod inventory;
pub mod parts_list;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use heapview_runtime::sim::{Delivery, SimHeap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    PartsList,
    Friends,
    Inventory,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Self::PartsList, Self::Friends, Self::Inventory];

    pub fn name(self) -> &'static str {
        match self {
            Self::PartsList => "parts-list",
            Self::Friends => "friends",
            Self::Inventory => "inventory",
        }
    }

    pub fn heap(self, delivery: Delivery) -> Arc<SimHeap> {
        match self {
            Self::PartsList => parts_list::heap(delivery),
            Self::Friends => friends::heap(delivery),
            Self::Inventory => inventory::heap(delivery),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.name() == s.trim())
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|s| s.name()).collect();
                format!("unknown scenario {s:?} (known: {})", known.join(", "))
            })
    }
}
