use dialogdump_core::{
    BackupSession, Dialog, DumpFlow, DumpProgress, Dumper, MemoryProgressStore, MemoryProvider,
    Message,
};
use proptest::prelude::*;

/// Accepts messages until `budget` runs out, then aborts the dialog.
struct Budgeted {
    budget: Option<usize>,
    dumped: Vec<i64>,
}

impl Dumper for Budgeted {
    fn name(&self) -> &str {
        "budgeted"
    }

    fn dump_message(&mut self, _dialog: &Dialog, message: &Message) -> anyhow::Result<DumpFlow> {
        if let Some(budget) = self.budget.as_mut() {
            if *budget == 0 {
                return Ok(DumpFlow::Abort);
            }
            *budget -= 1;
        }
        self.dumped.push(message.id);
        Ok(DumpFlow::Continue)
    }
}

fn unique_ids() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::btree_set(0i64..1_000, 0..40).prop_map(|set| set.into_iter().collect())
}

proptest! {
    /// Property: the default policy accepts exactly the keys above last_id
    #[test]
    fn prop_freshness_matches_last_id(last in proptest::option::of(-100i64..100), id in -200i64..200) {
        let progress = DumpProgress::new(last);
        let expected = last.map_or(true, |l| id > l);
        prop_assert_eq!(progress.is_fresh(id), expected);
    }

    /// Property: last_id never decreases, whatever the dumper does
    #[test]
    fn prop_last_id_is_monotonic(
        first in unique_ids(),
        second in unique_ids(),
        budgets in prop::collection::vec(proptest::option::of(0usize..5), 2),
    ) {
        let mut provider = MemoryProvider::new().with_dialog(
            Dialog::new("d"),
            first.iter().map(|&id| Message::new(id)).collect(),
        );
        let mut store = MemoryProgressStore::new();

        let mut dumper = Budgeted { budget: budgets[0], dumped: Vec::new() };
        BackupSession::new(&mut provider, &mut store, &mut dumper).run().unwrap();
        let after_first = store.get("d").and_then(|p| p.last_id);

        let extra: Vec<_> = second
            .iter()
            .filter(|id| !first.contains(id))
            .map(|&id| Message::new(id))
            .collect();
        provider.push_messages("d", extra);

        let mut dumper = Budgeted { budget: budgets[1], dumped: Vec::new() };
        BackupSession::new(&mut provider, &mut store, &mut dumper).run().unwrap();
        let after_second = store.get("d").and_then(|p| p.last_id);

        prop_assert!(after_second >= after_first);
        if let Some(prev) = after_first {
            prop_assert!(dumper.dumped.iter().all(|&id| id > prev));
        }
    }

    /// Property: a completed run leaves nothing fresh for the next one
    #[test]
    fn prop_completed_run_is_idempotent(ids in unique_ids()) {
        let mut provider = MemoryProvider::new().with_dialog(
            Dialog::new("d"),
            ids.iter().map(|&id| Message::new(id)).collect(),
        );
        let mut store = MemoryProgressStore::new();

        let mut first = Budgeted { budget: None, dumped: Vec::new() };
        BackupSession::new(&mut provider, &mut store, &mut first).run().unwrap();
        prop_assert_eq!(first.dumped.len(), ids.len());
        prop_assert!(first.dumped.windows(2).all(|w| w[0] > w[1]));

        let mut second = Budgeted { budget: None, dumped: Vec::new() };
        BackupSession::new(&mut provider, &mut store, &mut second).run().unwrap();
        prop_assert!(second.dumped.is_empty());
        prop_assert_eq!(store.get("d").and_then(|p| p.last_id), ids.iter().max().copied());
    }
}
