// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Scenario vocabulary carried by scaling commands.
//!
//! Structural scenarios (`scale-up-eu`, `scale-down-us`, ...) name a region
//! group and a direction. Demand-shape scenarios (`flash-sale`, `new-product`,
//! `scandal`) are recognised but have no scaling semantics for a controller.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::Region;

/// Region groups addressed by structural scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionGroup {
    Eu,
    Us,
    Ap,
}

impl RegionGroup {
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Eu => "eu",
            Self::Us => "us",
            Self::Ap => "ap",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "eu" => Some(Self::Eu),
            "us" => Some(Self::Us),
            "ap" => Some(Self::Ap),
            _ => None,
        }
    }
}

/// Single-worker pool adjustment. Both scaling protocols reduce to this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeStep {
    Grow,
    Shrink,
}

impl ResizeStep {
    pub const fn delta(&self) -> i8 {
        match self {
            Self::Grow => 1,
            Self::Shrink => -1,
        }
    }
}

/// A parsed scenario tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scenario {
    /// Permanently adds load in a region group.
    ScaleUp(RegionGroup),
    /// Permanently removes load in a region group.
    ScaleDown(RegionGroup),
    /// Global demand spike.
    FlashSale,
    /// Demand for a new product.
    NewProduct,
    /// Global demand drop.
    Scandal,
    /// Connectivity check.
    Test,
    /// Anything else; logged and ignored.
    Unknown(String),
}

impl Scenario {
    /// Parse a tag. Parsing never fails; unrecognised tags become `Unknown`.
    pub fn parse(tag: &str) -> Self {
        let tag = tag.trim();
        match tag {
            "flash-sale" => return Self::FlashSale,
            "new-product" => return Self::NewProduct,
            "scandal" => return Self::Scandal,
            "test" => return Self::Test,
            _ => {}
        }

        if let Some(group) = tag.strip_prefix("scale-up-").and_then(RegionGroup::from_tag) {
            return Self::ScaleUp(group);
        }
        if let Some(group) = tag
            .strip_prefix("scale-down-")
            .and_then(RegionGroup::from_tag)
        {
            return Self::ScaleDown(group);
        }

        Self::Unknown(tag.to_string())
    }

    /// Region group and step for structural scenarios, `None` otherwise.
    pub fn structural(&self) -> Option<(RegionGroup, ResizeStep)> {
        match self {
            Self::ScaleUp(group) => Some((*group, ResizeStep::Grow)),
            Self::ScaleDown(group) => Some((*group, ResizeStep::Shrink)),
            _ => None,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScaleUp(group) => write!(f, "scale-up-{}", group.tag()),
            Self::ScaleDown(group) => write!(f, "scale-down-{}", group.tag()),
            Self::FlashSale => write!(f, "flash-sale"),
            Self::NewProduct => write!(f, "new-product"),
            Self::Scandal => write!(f, "scandal"),
            Self::Test => write!(f, "test"),
            Self::Unknown(tag) => write!(f, "{}", tag),
        }
    }
}

/// Concrete region names behind each region group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionMap {
    pub eu: Region,
    pub us: Region,
    pub ap: Region,
}

impl RegionMap {
    pub fn get(&self, group: RegionGroup) -> &Region {
        match group {
            RegionGroup::Eu => &self.eu,
            RegionGroup::Us => &self.us,
            RegionGroup::Ap => &self.ap,
        }
    }

    /// Resolve a scenario to the region it targets and the step to apply there.
    pub fn resolve(&self, scenario: &Scenario) -> Option<(&Region, ResizeStep)> {
        scenario
            .structural()
            .map(|(group, step)| (self.get(group), step))
    }
}

impl Default for RegionMap {
    fn default() -> Self {
        Self {
            eu: Region::new_unchecked("aws-eu-west-2"),
            us: Region::new_unchecked("aws-us-east-1"),
            ap: Region::new_unchecked("aws-ap-southeast-1"),
        }
    }
}
