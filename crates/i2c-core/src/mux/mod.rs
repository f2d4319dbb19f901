//! Live multiplexer routing state for one bus.
//!
//! Mux parts hold their last selected segment until told otherwise, so the
//! owning server remembers what it last selected and skips redundant select
//! writes. After any uncertain outcome the remembered state is discarded
//! (`Unknown`) and the next routed access re-selects from scratch.

use log::{debug, warn};

use crate::{MuxId, Route};

/// Select encodings per part family.
pub mod driver;

/// What the tracker believes the mux hardware on a bus is routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MuxRoutingState {
    /// Every mux on the bus has all segments disconnected.
    #[default]
    NoSegmentActive,
    /// Exactly this mux/segment pair is connected.
    SegmentActive(Route),
    /// Hardware state is uncertain after a failed or interrupted write.
    Unknown,
}

/// Control writes that move mux hardware between segments.
pub trait MuxSelect {
    /// Failure of a control write.
    type Error;

    /// Connects `route.segment` on `route.mux`, disconnecting its other segments.
    ///
    /// # Errors
    ///
    /// Returns an error if the control write cannot be issued or fails.
    fn select(&mut self, route: Route) -> Result<(), Self::Error>;

    /// Disconnects every segment on `mux`.
    ///
    /// # Errors
    ///
    /// Returns an error if the control write cannot be issued or fails.
    fn deselect(&mut self, mux: MuxId) -> Result<(), Self::Error>;
}

/// Result of a successful routing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteAction {
    /// The route was already live; nothing was written.
    AlreadyRouted,
    /// A select write was issued.
    Selected,
}

/// Routing state machine for the muxes attached to one bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxTracker {
    muxes: Vec<MuxId>,
    state: MuxRoutingState,
}

impl MuxTracker {
    /// Creates a tracker for a bus carrying `muxes`, starting with no
    /// segment active.
    #[must_use]
    pub fn new(muxes: impl IntoIterator<Item = MuxId>) -> Self {
        Self {
            muxes: muxes.into_iter().collect(),
            state: MuxRoutingState::NoSegmentActive,
        }
    }

    /// Current routing belief.
    #[must_use]
    pub const fn state(&self) -> MuxRoutingState {
        self.state
    }

    /// Muxes attached to this bus.
    #[must_use]
    pub fn muxes(&self) -> &[MuxId] {
        &self.muxes
    }

    /// Makes `target` the live route, writing only what is needed.
    ///
    /// A repeat request for the active route writes nothing. Moving to a
    /// different mux first disconnects the previously active one. From
    /// `Unknown`, every other mux on the bus is disconnected before the
    /// select, since any of them may still be connected.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing control write; the state is
    /// then `Unknown`.
    pub fn route<S>(&mut self, target: Route, selector: &mut S) -> Result<RouteAction, S::Error>
    where
        S: MuxSelect + ?Sized,
    {
        match self.state {
            MuxRoutingState::SegmentActive(active) if active == target => {
                return Ok(RouteAction::AlreadyRouted);
            }
            MuxRoutingState::SegmentActive(active) if active.mux != target.mux => {
                self.disconnect(active.mux, selector)?;
                self.state = MuxRoutingState::NoSegmentActive;
            }
            MuxRoutingState::SegmentActive(_) | MuxRoutingState::NoSegmentActive => {}
            MuxRoutingState::Unknown => {
                let others: Vec<MuxId> = self
                    .muxes
                    .iter()
                    .copied()
                    .filter(|mux| *mux != target.mux)
                    .collect();
                for mux in others {
                    self.disconnect(mux, selector)?;
                }
            }
        }

        if let Err(err) = selector.select(target) {
            self.mark_unknown();
            return Err(err);
        }
        debug!("mux routing now {target}");
        self.state = MuxRoutingState::SegmentActive(target);
        Ok(RouteAction::Selected)
    }

    /// Discards the routing belief after an uncertain outcome.
    pub fn mark_unknown(&mut self) {
        if self.state != MuxRoutingState::Unknown {
            warn!("mux routing state unknown (was {:?})", self.state);
        }
        self.state = MuxRoutingState::Unknown;
    }

    fn disconnect<S>(&mut self, mux: MuxId, selector: &mut S) -> Result<(), S::Error>
    where
        S: MuxSelect + ?Sized,
    {
        selector.deselect(mux).map_err(|err| {
            self.mark_unknown();
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::{MuxRoutingState, MuxSelect, MuxTracker, RouteAction};
    use crate::{BusFault, MuxId, Route, SegmentId};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Write {
        Select(Route),
        Deselect(MuxId),
    }

    #[derive(Default)]
    struct Recorder {
        writes: Vec<Write>,
        fail_next: Option<BusFault>,
    }

    impl Recorder {
        fn outcome(&mut self) -> Result<(), BusFault> {
            self.fail_next.take().map_or(Ok(()), Err)
        }

        fn selects(&self) -> usize {
            self.writes
                .iter()
                .filter(|w| matches!(w, Write::Select(_)))
                .count()
        }
    }

    impl MuxSelect for Recorder {
        type Error = BusFault;

        fn select(&mut self, route: Route) -> Result<(), BusFault> {
            self.writes.push(Write::Select(route));
            self.outcome()
        }

        fn deselect(&mut self, mux: MuxId) -> Result<(), BusFault> {
            self.writes.push(Write::Deselect(mux));
            self.outcome()
        }
    }

    const M0: MuxId = MuxId(0);
    const M1: MuxId = MuxId(1);

    fn route(mux: MuxId, segment: u8) -> Route {
        Route::new(mux, SegmentId(segment))
    }

    #[test]
    fn initial_state_is_no_segment_active() {
        let tracker = MuxTracker::new([M0]);
        assert_eq!(tracker.state(), MuxRoutingState::NoSegmentActive);
    }

    #[test]
    fn repeat_request_selects_exactly_once() {
        let mut tracker = MuxTracker::new([M1]);
        let mut bus = Recorder::default();

        assert_eq!(
            tracker.route(route(M1, 2), &mut bus),
            Ok(RouteAction::Selected)
        );
        assert_eq!(
            tracker.route(route(M1, 2), &mut bus),
            Ok(RouteAction::AlreadyRouted)
        );
        assert_eq!(bus.writes, vec![Write::Select(route(M1, 2))]);
        assert_eq!(
            tracker.state(),
            MuxRoutingState::SegmentActive(route(M1, 2))
        );
    }

    #[test]
    fn changing_segment_on_same_mux_reselects_without_deselect() {
        let mut tracker = MuxTracker::new([M0]);
        let mut bus = Recorder::default();

        tracker.route(route(M0, 1), &mut bus).unwrap();
        tracker.route(route(M0, 2), &mut bus).unwrap();

        assert_eq!(
            bus.writes,
            vec![Write::Select(route(M0, 1)), Write::Select(route(M0, 2))]
        );
    }

    #[test]
    fn changing_mux_disconnects_the_previous_one_first() {
        let mut tracker = MuxTracker::new([M0, M1]);
        let mut bus = Recorder::default();

        tracker.route(route(M0, 3), &mut bus).unwrap();
        tracker.route(route(M1, 1), &mut bus).unwrap();

        assert_eq!(
            bus.writes,
            vec![
                Write::Select(route(M0, 3)),
                Write::Deselect(M0),
                Write::Select(route(M1, 1)),
            ]
        );
    }

    #[rstest]
    #[case(BusFault::NoAck)]
    #[case(BusFault::Timeout)]
    #[case(BusFault::ArbitrationLost)]
    fn failed_select_moves_to_unknown(#[case] fault: BusFault) {
        let mut tracker = MuxTracker::new([M0]);
        let mut bus = Recorder {
            fail_next: Some(fault),
            ..Recorder::default()
        };

        assert_eq!(tracker.route(route(M0, 1), &mut bus), Err(fault));
        assert_eq!(tracker.state(), MuxRoutingState::Unknown);
    }

    #[test]
    fn unknown_state_reissues_select_even_for_the_same_route() {
        let mut tracker = MuxTracker::new([M0]);
        let mut bus = Recorder::default();

        tracker.route(route(M0, 2), &mut bus).unwrap();
        tracker.mark_unknown();
        assert_eq!(
            tracker.route(route(M0, 2), &mut bus),
            Ok(RouteAction::Selected)
        );
        assert_eq!(bus.selects(), 2);
    }

    #[test]
    fn unknown_state_disconnects_every_other_mux() {
        let mut tracker = MuxTracker::new([M0, M1, MuxId(2)]);
        let mut bus = Recorder::default();

        tracker.mark_unknown();
        tracker.route(route(M1, 4), &mut bus).unwrap();

        assert_eq!(
            bus.writes,
            vec![
                Write::Deselect(M0),
                Write::Deselect(MuxId(2)),
                Write::Select(route(M1, 4)),
            ]
        );
    }

    #[test]
    fn failed_deselect_leaves_state_unknown_and_skips_select() {
        let mut tracker = MuxTracker::new([M0, M1]);
        let mut bus = Recorder::default();

        tracker.route(route(M0, 1), &mut bus).unwrap();
        bus.fail_next = Some(BusFault::NoAck);

        assert_eq!(tracker.route(route(M1, 1), &mut bus), Err(BusFault::NoAck));
        assert_eq!(tracker.state(), MuxRoutingState::Unknown);
        assert_eq!(bus.selects(), 1);
    }
}
