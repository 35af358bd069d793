pub mod install;

use crate::kiln::targets::TargetState;
use crate::kiln::{Kiln, Stage};
use async_trait::async_trait;
use lazy_static::lazy_static;
use std::fmt::Debug;

#[async_trait]
pub trait HookVTable: Debug + Sync {
    fn prio(&self) -> usize;
    fn when(&self) -> (Stage, HookTrigger);

    async fn trigger(&self, state: &mut TargetState, kiln: &Kiln) -> anyhow::Result<()>;
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum HookTrigger {
    Before,
    After,
}

const HOOKS: &[&'static dyn HookVTable] = &[&install::VerifyInstall, &install::StripInstalled];

lazy_static! {
    pub static ref SORTED_HOOKS: Vec<&'static dyn HookVTable> = get_sorted_hooks();
}

fn get_sorted_hooks() -> Vec<&'static dyn HookVTable> {
    let mut hooks = HOOKS.to_vec();
    hooks.sort_by_key(|hook| (hook.when(), hook.prio()));

    hooks
}

#[async_trait]
pub trait Hook: Debug {
    const PRIORITY: usize;
    const TRIGGER: HookTrigger;
    const STAGE: Stage;

    async fn run(&self, state: &mut TargetState, kiln: &Kiln) -> anyhow::Result<()>;
}

#[async_trait]
impl<T: Hook + Sync> HookVTable for T {
    fn prio(&self) -> usize {
        Self::PRIORITY
    }

    fn when(&self) -> (Stage, HookTrigger) {
        (Self::STAGE, Self::TRIGGER)
    }

    async fn trigger(&self, state: &mut TargetState, kiln: &Kiln) -> anyhow::Result<()> {
        self.run(state, kiln).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hooks_sort_by_stage_then_priority() {
        let sorted = get_sorted_hooks();

        assert_eq!(sorted.len(), 2);
        assert!(sorted[0].prio() <= sorted[1].prio());
        assert_eq!(sorted[0].when(), (Stage::Install, HookTrigger::After));
    }
}
