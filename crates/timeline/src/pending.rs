use std::collections::{HashMap, HashSet};

use crate::{Clip, ClipId, MutationPlan, MutationRecord, TrackId};

/// Clips of one track as the planners see them.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackState {
    pub track_id: TrackId,
    pub locked: bool,
    pub clips: Vec<Clip>,
}

impl TrackState {
    pub fn new(track_id: TrackId, clips: Vec<Clip>) -> Self {
        Self {
            track_id,
            locked: false,
            clips,
        }
    }

    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }
}

/// Proposed clip states layered over the persisted rows while one command
/// is still planning. Occlusion and ripple read through it so later steps
/// see the effect of earlier ones.
#[derive(Debug, Clone, Default)]
pub struct PendingClips {
    proposed: HashMap<ClipId, Clip>,
    removed: HashSet<ClipId>,
    in_flight: HashSet<ClipId>,
}

impl PendingClips {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn propose(&mut self, clip: Clip) {
        self.removed.remove(&clip.id);
        self.proposed.insert(clip.id.clone(), clip);
    }

    pub fn remove(&mut self, clip_id: &ClipId) {
        self.proposed.remove(clip_id);
        self.removed.insert(clip_id.clone());
    }

    /// Clips being moved by the command itself; occlusion leaves them alone.
    pub fn mark_in_flight(&mut self, clip_id: &ClipId) {
        self.in_flight.insert(clip_id.clone());
    }

    pub fn is_in_flight(&self, clip_id: &ClipId) -> bool {
        self.in_flight.contains(clip_id)
    }

    pub fn get(&self, clip_id: &ClipId) -> Option<&Clip> {
        self.proposed.get(clip_id)
    }

    pub fn is_removed(&self, clip_id: &ClipId) -> bool {
        self.removed.contains(clip_id)
    }

    /// Folds every record of `plan` into the overlay.
    pub fn absorb(&mut self, plan: &MutationPlan) {
        for record in plan.records() {
            match record {
                MutationRecord::Insert { clip } => self.propose(clip.clone()),
                MutationRecord::Update { after, .. } => self.propose(after.clone()),
                MutationRecord::Delete { clip_id, .. } => self.remove(clip_id),
            }
        }
    }

    /// The clips of `track` with proposals substituted for persisted rows,
    /// sorted by start.
    pub fn effective(&self, track: &TrackState) -> Vec<Clip> {
        let mut seen: HashSet<&ClipId> = HashSet::new();
        let mut clips = Vec::with_capacity(track.clips.len());
        for clip in &track.clips {
            seen.insert(&clip.id);
            if self.removed.contains(&clip.id) {
                continue;
            }
            match self.proposed.get(&clip.id) {
                Some(proposed) if proposed.track_id.as_ref() == Some(&track.track_id) => {
                    clips.push(proposed.clone())
                }
                Some(_) => {}
                None => clips.push(clip.clone()),
            }
        }
        for proposed in self.proposed.values() {
            if !seen.contains(&proposed.id)
                && proposed.track_id.as_ref() == Some(&track.track_id)
            {
                clips.push(proposed.clone());
            }
        }
        clips.sort_by(|a, b| {
            a.start_frame()
                .cmp(&b.start_frame())
                .then_with(|| a.id.cmp(&b.id))
        });
        clips
    }

    /// `track` with its clips replaced by the effective view.
    pub fn overlay(&self, track: &TrackState) -> TrackState {
        TrackState {
            track_id: track.track_id.clone(),
            locked: track.locked,
            clips: self.effective(track),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::fixtures::clip_on;
    use crate::{plan_delete, plan_insert, plan_update};

    #[test]
    fn effective_view_substitutes_proposals() {
        let a = clip_on("v1", "a", 0, 10);
        let b = clip_on("v1", "b", 10, 10);
        let c = clip_on("v1", "c", 30, 10);
        let track = TrackState::new(TrackId::from("v1"), vec![a.clone(), b.clone(), c.clone()]);

        let mut plan = MutationPlan::new();
        plan.push(plan_update(&a.moved_to(50), &a)).unwrap();
        plan.push(plan_delete(&b)).unwrap();
        plan.push(plan_insert(&clip_on("v1", "d", 12, 4))).unwrap();
        plan.push(plan_insert(&clip_on("v2", "e", 0, 4))).unwrap();

        let mut pending = PendingClips::new();
        pending.absorb(&plan);
        let ids: Vec<(String, i64)> = pending
            .effective(&track)
            .into_iter()
            .map(|c| (c.id.to_string(), c.start_frame()))
            .collect();
        assert_eq!(
            ids,
            vec![
                ("d".to_string(), 12),
                ("c".to_string(), 30),
                ("a".to_string(), 50)
            ]
        );
    }

    #[test]
    fn clip_moved_to_another_track_leaves_the_view() {
        let a = clip_on("v1", "a", 0, 10);
        let track = TrackState::new(TrackId::from("v1"), vec![a.clone()]);
        let mut moved = a.clone();
        moved.track_id = Some(TrackId::from("v2"));

        let mut pending = PendingClips::new();
        pending.propose(moved);
        assert!(pending.effective(&track).is_empty());
    }
}
