//! Logical timestamps and the two clock flavors.
//!
//! Every operation is identified by a [`Ts`] `(sid, time)`. Timestamps are
//! totally ordered by `time` first and `sid` second. A [`ClockVector`] tracks
//! the local session plus the last time observed from every peer session; a
//! [`ServerClockVector`] is the single-session variant used when a central
//! server sequences all operations.
//!
//! Clock arithmetic saturates at `u64::MAX`; the codecs keep decoded times
//! at or below [`SESSION::MAX`], so saturation is never reached by valid
//! input.

use crate::json_crdt_patch::enums::SESSION;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// A logical timestamp: `(session id, logical time)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ts {
    pub sid: u64,
    pub time: u64,
}

impl Ts {
    pub const fn new(sid: u64, time: u64) -> Self {
        Self { sid, time }
    }

    /// Last timestamp covered by a range of `span` ticks starting here.
    pub fn edge(self, span: u64) -> Ts {
        tick(self, span.saturating_sub(1))
    }
}

impl Ord for Ts {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time).then(self.sid.cmp(&other.sid))
    }
}

impl PartialOrd for Ts {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Ts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&print_ts(*self))
    }
}

/// A contiguous range of `span` timestamps of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tss {
    pub sid: u64,
    pub time: u64,
    pub span: u64,
}

impl Tss {
    pub const fn new(sid: u64, time: u64, span: u64) -> Self {
        Self { sid, time, span }
    }

    pub fn ts(&self) -> Ts {
        Ts::new(self.sid, self.time)
    }
}

#[inline]
pub fn ts(sid: u64, time: u64) -> Ts {
    Ts::new(sid, time)
}

#[inline]
pub fn tss(sid: u64, time: u64, span: u64) -> Tss {
    Tss::new(sid, time, span)
}

/// Advance a timestamp by `cycles` within its own session.
#[inline]
pub fn tick(stamp: Ts, cycles: u64) -> Ts {
    Ts::new(stamp.sid, stamp.time.saturating_add(cycles))
}

/// Returns `true` if `[ts1, ts1 + span1)` fully covers `[ts2, ts2 + span2)`.
pub fn contains(ts1: Ts, span1: u64, ts2: Ts, span2: u64) -> bool {
    ts1.sid == ts2.sid
        && ts1.time <= ts2.time
        && ts1.time.saturating_add(span1) >= ts2.time.saturating_add(span2)
}

/// Returns `true` if `[ts1, ts1 + span1)` covers the single timestamp `ts2`.
pub fn contains_id(ts1: Ts, span1: u64, ts2: Ts) -> bool {
    contains(ts1, span1, ts2, 1)
}

/// Range of `span` ticks starting `offset` ticks after `stamp`.
pub fn interval(stamp: Ts, offset: u64, span: u64) -> Tss {
    Tss::new(stamp.sid, stamp.time.saturating_add(offset), span)
}

/// Short human readable form, e.g. `..3456.12` or `.7` for the server.
pub fn print_ts(id: Ts) -> String {
    if id.sid == SESSION::SERVER {
        return format!(".{}", id.time);
    }
    let s = id.sid.to_string();
    if s.len() > 4 {
        format!("..{}.{}", &s[s.len() - 4..], id.time)
    } else {
        format!("{}.{}", s, id.time)
    }
}

// ── ClockVector ────────────────────────────────────────────────────────────

/// Local logical clock plus the latest timestamp seen from each peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockVector {
    pub sid: u64,
    pub time: u64,
    pub peers: HashMap<u64, Ts>,
}

impl ClockVector {
    pub fn new(sid: u64, time: u64) -> Self {
        Self {
            sid,
            time,
            peers: HashMap::new(),
        }
    }

    pub fn ts(&self) -> Ts {
        Ts::new(self.sid, self.time)
    }

    /// Returns the current timestamp and advances the clock by `cycles`.
    pub fn tick(&mut self, cycles: u64) -> Ts {
        let stamp = self.ts();
        self.time = self.time.saturating_add(cycles);
        stamp
    }

    pub fn next(&mut self) -> Ts {
        self.tick(1)
    }

    /// Merge knowledge of the range `[id, id + span)`.
    ///
    /// Peer entries only grow, and local time never moves backwards: a range
    /// that lies entirely behind the clock leaves local time untouched.
    pub fn observe(&mut self, id: Ts, span: u64) {
        if span == 0 {
            return;
        }
        let edge = id.edge(span);
        if id.sid != self.sid {
            self.peers
                .entry(id.sid)
                .and_modify(|last| {
                    if edge.time > last.time {
                        *last = edge;
                    }
                })
                .or_insert(edge);
        }
        if edge.time >= self.time {
            self.time = edge.time.saturating_add(1);
        }
    }

    /// Copy with the same session id.
    pub fn clone_same(&self) -> ClockVector {
        self.fork(self.sid)
    }

    /// Copy continuing from the same time under `new_sid`.
    ///
    /// When the session changes, the old session becomes a peer so that its
    /// history stays part of the known clock table.
    pub fn fork(&self, new_sid: u64) -> ClockVector {
        let mut clock = ClockVector::new(new_sid, self.time);
        if new_sid != self.sid && self.time > 0 {
            clock.observe(Ts::new(self.sid, self.time - 1), 1);
        }
        for peer in self.peers.values() {
            if peer.sid != new_sid {
                clock.observe(*peer, 1);
            }
        }
        clock
    }
}

impl fmt::Display for ClockVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clock {}.{}", self.sid, self.time)?;
        let mut peers: Vec<_> = self.peers.values().collect();
        peers.sort_by_key(|p| p.sid);
        for (i, peer) in peers.iter().enumerate() {
            let branch = if i + 1 == peers.len() { "└─" } else { "├─" };
            write!(f, "\n{} {}.{}", branch, peer.sid, peer.time)?;
        }
        Ok(())
    }
}

// ── ServerClockVector ──────────────────────────────────────────────────────

/// Clock for centrally sequenced documents: every timestamp belongs to
/// [`SESSION::SERVER`], so only `time` is meaningful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerClockVector {
    pub time: u64,
}

impl ServerClockVector {
    pub fn new(time: u64) -> Self {
        Self { time }
    }

    pub fn sid(&self) -> u64 {
        SESSION::SERVER
    }

    pub fn ts(&self) -> Ts {
        Ts::new(SESSION::SERVER, self.time)
    }

    pub fn tick(&mut self, cycles: u64) -> Ts {
        let stamp = self.ts();
        self.time = self.time.saturating_add(cycles);
        stamp
    }

    pub fn next(&mut self) -> Ts {
        self.tick(1)
    }

    /// Moves the clock past `[id, id + span)`; older ranges are ignored.
    pub fn observe(&mut self, id: Ts, span: u64) {
        let end = id.time.saturating_add(span);
        if end > self.time {
            self.time = end;
        }
    }
}

impl fmt::Display for ServerClockVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clock .{}", self.time)
    }
}

// ── Clock ──────────────────────────────────────────────────────────────────

/// The clock owned by a model or a patch builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clock {
    Vector(ClockVector),
    Server(ServerClockVector),
}

impl Clock {
    pub fn sid(&self) -> u64 {
        match self {
            Clock::Vector(c) => c.sid,
            Clock::Server(c) => c.sid(),
        }
    }

    pub fn time(&self) -> u64 {
        match self {
            Clock::Vector(c) => c.time,
            Clock::Server(c) => c.time,
        }
    }

    pub fn ts(&self) -> Ts {
        Ts::new(self.sid(), self.time())
    }

    pub fn is_server(&self) -> bool {
        matches!(self, Clock::Server(_))
    }

    /// Returns the current timestamp and advances the clock by `cycles`.
    pub fn tick(&mut self, cycles: u64) -> Ts {
        match self {
            Clock::Vector(c) => c.tick(cycles),
            Clock::Server(c) => c.tick(cycles),
        }
    }

    pub fn next(&mut self) -> Ts {
        self.tick(1)
    }

    pub fn observe(&mut self, id: Ts, span: u64) {
        match self {
            Clock::Vector(c) => c.observe(id, span),
            Clock::Server(c) => c.observe(id, span),
        }
    }

    /// Moves local time forward to at least `time` without touching peers.
    pub fn advance_to(&mut self, time: u64) {
        match self {
            Clock::Vector(c) => c.time = c.time.max(time),
            Clock::Server(c) => c.time = c.time.max(time),
        }
    }

    /// Independent copy under `new_sid`. Server clocks keep their session.
    pub fn fork(&self, new_sid: u64) -> Clock {
        match self {
            Clock::Vector(c) => Clock::Vector(c.fork(new_sid)),
            Clock::Server(c) => Clock::Server(c.clone()),
        }
    }
}

impl From<ClockVector> for Clock {
    fn from(clock: ClockVector) -> Self {
        Clock::Vector(clock)
    }
}

impl From<ServerClockVector> for Clock {
    fn from(clock: ServerClockVector) -> Self {
        Clock::Server(clock)
    }
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Clock::Vector(c) => c.fmt(f),
            Clock::Server(c) => c.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_time_then_session() {
        assert_eq!(ts(1, 10).cmp(&ts(2, 9)), Ordering::Greater);
        assert_eq!(ts(2, 9).cmp(&ts(1, 10)), Ordering::Less);
        assert_eq!(ts(2, 10).cmp(&ts(1, 10)), Ordering::Greater);
        assert_eq!(ts(3, 3).cmp(&ts(3, 3)), Ordering::Equal);
    }

    #[test]
    fn contains_checks_session_and_bounds() {
        assert!(contains(ts(1, 5), 10, ts(1, 6), 3));
        assert!(contains(ts(1, 5), 10, ts(1, 5), 10));
        assert!(!contains(ts(1, 5), 10, ts(1, 14), 2));
        assert!(!contains(ts(1, 5), 10, ts(2, 6), 1));
        assert!(contains_id(ts(1, 5), 2, ts(1, 6)));
        assert!(!contains_id(ts(1, 5), 2, ts(1, 7)));
    }

    #[test]
    fn next_advances_by_one() {
        let mut clock = ClockVector::new(7, 3);
        assert_eq!(clock.next(), ts(7, 3));
        assert_eq!(clock.next(), ts(7, 4));
        assert_eq!(clock.time, 5);
    }

    #[test]
    fn observe_records_peer_and_moves_time() {
        let mut clock = ClockVector::new(7, 3);
        clock.observe(ts(9, 10), 5);
        assert_eq!(clock.time, 15);
        assert_eq!(clock.peers.get(&9), Some(&ts(9, 14)));
    }

    #[test]
    fn observe_behind_is_a_noop_for_local_time() {
        let mut clock = ClockVector::new(7, 30);
        clock.observe(ts(9, 10), 2);
        assert_eq!(clock.time, 30);
        clock.observe(ts(9, 4), 1);
        assert_eq!(clock.peers.get(&9), Some(&ts(9, 11)));
    }

    #[test]
    fn observe_own_session_does_not_add_peer() {
        let mut clock = ClockVector::new(7, 3);
        clock.observe(ts(7, 3), 4);
        assert!(clock.peers.is_empty());
        assert_eq!(clock.time, 7);
    }

    #[test]
    fn fork_keeps_time_and_links_old_session() {
        let mut clock = ClockVector::new(7, 3);
        clock.observe(ts(9, 10), 1);
        let forked = clock.fork(100);
        assert_eq!(forked.sid, 100);
        assert_eq!(forked.time, clock.time);
        assert_eq!(forked.peers.get(&7), Some(&ts(7, 10)));
        assert_eq!(forked.peers.get(&9), Some(&ts(9, 10)));

        let mut forked = forked;
        forked.next();
        assert_eq!(clock.time, 11);
    }

    #[test]
    fn server_clock_never_moves_back() {
        let mut clock = ServerClockVector::new(10);
        clock.observe(ts(SESSION::SERVER, 3), 2);
        assert_eq!(clock.time, 10);
        clock.observe(ts(SESSION::SERVER, 10), 4);
        assert_eq!(clock.time, 14);
        assert_eq!(clock.next(), ts(SESSION::SERVER, 14));
    }

    #[test]
    fn arithmetic_saturates_at_the_top() {
        let mut clock = ClockVector::new(7, 3);
        clock.observe(ts(9, u64::MAX - 1), 10);
        assert_eq!(clock.time, u64::MAX);
        assert_eq!(clock.peers.get(&9), Some(&ts(9, u64::MAX)));
        assert_eq!(clock.next(), ts(7, u64::MAX));

        let mut server = ServerClockVector::new(10);
        server.observe(ts(SESSION::SERVER, u64::MAX), 2);
        assert_eq!(server.time, u64::MAX);

        assert!(contains_id(ts(1, u64::MAX - 1), 5, ts(1, u64::MAX)));
        assert_eq!(interval(ts(1, u64::MAX), 3, 1), tss(1, u64::MAX, 1));
    }

    #[test]
    fn print_shortens_long_sessions() {
        assert_eq!(print_ts(ts(123456789, 5)), "..6789.5");
        assert_eq!(print_ts(ts(42, 5)), "42.5");
        assert_eq!(print_ts(ts(SESSION::SERVER, 5)), ".5");
    }

    #[test]
    fn display_lists_peers_sorted() {
        let mut clock = ClockVector::new(5, 1);
        clock.observe(ts(9, 2), 1);
        clock.observe(ts(8, 4), 1);
        assert_eq!(clock.to_string(), "clock 5.5\n├─ 8.4\n└─ 9.2");
    }
}
