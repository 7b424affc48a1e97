#![allow(dead_code)]

use std::collections::BTreeSet;

use progsched::types::{Details, InstructionId};

pub fn ids(ids: &[&str]) -> BTreeSet<InstructionId> {
    ids.iter().map(|id| InstructionId::from(*id)).collect()
}

pub fn unmet(unmet_ids: &[&str]) -> Option<Details> {
    Some(Details::unmet(ids(unmet_ids)))
}

pub fn id(id: &str) -> InstructionId {
    InstructionId::from(id)
}
