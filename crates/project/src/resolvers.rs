use timeline::{IdAllocator, MutationPlan, PendingClips, RationalTime, RoundingMode, TrackId};

use crate::{ProjectDb, StoreResult};

impl ProjectDb {
    /// Plans a uniform shift of everything at or after `insert_time` on one track.
    pub fn resolve_ripple(
        &self,
        track_id: &TrackId,
        insert_time: RationalTime,
        shift_amount: RationalTime,
    ) -> StoreResult<MutationPlan> {
        let track = self.track_state(track_id)?;
        Ok(timeline::resolve_ripple(&track, insert_time, shift_amount)?)
    }

    /// Plans carving `[timeline_start, timeline_start + duration)` out of one track.
    pub fn resolve_occlusion(
        &self,
        track_id: &TrackId,
        timeline_start: RationalTime,
        duration: RationalTime,
        pending: Option<&PendingClips>,
        ids: &mut IdAllocator,
        mode: RoundingMode,
    ) -> StoreResult<MutationPlan> {
        let track = self.track_state(track_id)?;
        Ok(timeline::resolve_occlusion(
            &track,
            timeline_start,
            duration,
            pending,
            ids,
            mode,
        )?)
    }
}
