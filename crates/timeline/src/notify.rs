use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Clip, ClipId, MutationRecord, SequenceId};

/// What changed in one sequence, for patching a clip cache in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationNotification {
    pub sequence_id: SequenceId,
    pub inserts: Vec<Clip>,
    pub updates: Vec<Clip>,
    pub deletes: Vec<ClipId>,
}

impl MutationNotification {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

/// Groups executed records by owning sequence. Clips without a sequence
/// (master clips) are not reported.
pub fn notifications_for<'a>(
    records: impl IntoIterator<Item = &'a MutationRecord>,
) -> Vec<MutationNotification> {
    let mut by_sequence: BTreeMap<SequenceId, MutationNotification> = BTreeMap::new();
    for record in records {
        let Some(sequence_id) = record.sequence_id() else {
            continue;
        };
        let entry = by_sequence
            .entry(sequence_id.clone())
            .or_insert_with(|| MutationNotification {
                sequence_id: sequence_id.clone(),
                ..Default::default()
            });
        match record {
            MutationRecord::Insert { clip } => entry.inserts.push(clip.clone()),
            MutationRecord::Update { after, .. } => entry.updates.push(after.clone()),
            MutationRecord::Delete { clip_id, .. } => entry.deletes.push(clip_id.clone()),
        }
    }
    by_sequence.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::fixtures::clip_on;
    use crate::{plan_delete, plan_insert, plan_update};

    #[test]
    fn groups_records_per_sequence() {
        let a = clip_on("v1", "a", 0, 10);
        let b = clip_on("v1", "b", 10, 10);
        let mut other = clip_on("v1", "c", 0, 10);
        other.owner_sequence_id = Some(SequenceId::from("other"));
        let mut master = clip_on("v1", "m", 0, 10);
        master.owner_sequence_id = None;

        let records = vec![
            plan_insert(&a),
            plan_update(&b.moved_to(20), &b),
            plan_delete(&other),
            plan_insert(&master),
        ];
        let notes = notifications_for(&records);
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].sequence_id.as_str(), "other");
        assert_eq!(notes[0].deletes, vec![ClipId::from("c")]);
        assert_eq!(notes[1].inserts.len(), 1);
        assert_eq!(notes[1].updates[0].start_frame(), 20);
    }
}
