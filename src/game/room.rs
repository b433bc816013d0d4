//! Match rooms: one async task per room, driven by a fixed-rate tick and a
//! command channel fed by the WebSocket sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::input::InputManager;
use super::latency::ClientStat;
use super::stats::PlayerStats;
use super::world::{World, WorldEvent};
use crate::store::StatsStore;
use crate::util::time::{unix_millis, PATCH_INTERVAL_MICROS, TICK_DURATION_MICROS};
use crate::ws::protocol::{MatchStats, PlayerMatchStats, RoomStatus, ServerMsg};

/// A room holds exactly one duel
pub const MAX_CLIENTS: usize = 2;
/// Simulation time after which an undecided match is called a draw
pub const MATCH_DURATION_MS: f64 = 600_000.0;

/// Commands a session can send to its room
pub enum RoomCmd {
    Join {
        session_id: Uuid,
        uid: String,
        tx: mpsc::UnboundedSender<ServerMsg>,
    },
    Input {
        session_id: Uuid,
        step: u32,
        timestamp: f64,
        keys: HashMap<String, bool>,
    },
    Leave {
        session_id: Uuid,
    },
}

/// Cheap cloneable handle to a running room task
#[derive(Clone)]
pub struct RoomHandle {
    pub id: Uuid,
    cmd_tx: mpsc::UnboundedSender<RoomCmd>,
}

impl RoomHandle {
    pub fn send(&self, cmd: RoomCmd) -> bool {
        self.cmd_tx.send(cmd).is_ok()
    }
}

/// Tracks live rooms and which user ids are currently connected, so a user
/// cannot join twice from two tabs.
pub struct RoomRegistry {
    rooms: DashMap<Uuid, RoomHandle>,
    connected_uids: DashSet<String>,
    /// The one room currently waiting for its second player, if any
    open_room: std::sync::Mutex<Option<RoomHandle>>,
    stats_store: StatsStore,
}

impl RoomRegistry {
    pub fn new(stats_store: StatsStore) -> Self {
        Self {
            rooms: DashMap::new(),
            connected_uids: DashSet::new(),
            open_room: std::sync::Mutex::new(None),
            stats_store,
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn player_count(&self) -> usize {
        self.connected_uids.len()
    }

    /// Claim a user id for the duration of a connection. Fails if the uid is
    /// already connected somewhere.
    pub fn claim_uid(&self, uid: &str) -> bool {
        self.connected_uids.insert(uid.to_string())
    }

    pub fn release_uid(&self, uid: &str) {
        self.connected_uids.remove(uid);
    }

    /// Seat a player: fill the waiting room when one exists, otherwise spawn
    /// a fresh room and leave it waiting for an opponent.
    pub fn find_or_create(registry: &Arc<RoomRegistry>) -> RoomHandle {
        let mut open = registry
            .open_room
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        if let Some(handle) = open.take() {
            if !handle.cmd_tx.is_closed() {
                // Second seat taken; the room is no longer open
                return handle;
            }
        }

        let handle = Self::spawn_room(registry);
        *open = Some(handle.clone());
        handle
    }

    fn spawn_room(registry: &Arc<RoomRegistry>) -> RoomHandle {
        let id = Uuid::new_v4();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let handle = RoomHandle { id, cmd_tx };
        registry.rooms.insert(id, handle.clone());

        let room = GameRoom::new(id, registry.stats_store.clone());
        let registry = Arc::clone(registry);
        tokio::spawn(async move {
            room.run(cmd_rx).await;
            registry.rooms.remove(&id);
        });
        handle
    }
}

struct Session {
    uid: String,
    tx: mpsc::UnboundedSender<ServerMsg>,
}

/// One running match. Owned by its task; all interaction goes through
/// `RoomCmd`.
pub struct GameRoom {
    id: Uuid,
    status: RoomStatus,
    world: World,
    sessions: HashMap<Uuid, Session>,
    /// User ids of everyone who ever sat in this room. Unlike `sessions`,
    /// entries survive a leave so stats for a deserter still carry a uid.
    uids: HashMap<Uuid, String>,
    inputs: HashMap<Uuid, InputManager>,
    client_stats: HashMap<Uuid, ClientStat>,
    match_stats: HashMap<Uuid, PlayerStats>,
    seats_taken: usize,
    ended: bool,
    stats_store: StatsStore,
}

impl GameRoom {
    fn new(id: Uuid, stats_store: StatsStore) -> Self {
        Self {
            id,
            status: RoomStatus::Matching,
            world: World::new(ChaCha8Rng::from_entropy()),
            sessions: HashMap::new(),
            uids: HashMap::new(),
            inputs: HashMap::new(),
            client_stats: HashMap::new(),
            match_stats: HashMap::new(),
            seats_taken: 0,
            ended: false,
            stats_store,
        }
    }

    /// Run the room until every session has left
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<RoomCmd>) {
        let mut sim_ticker = tokio::time::interval(Duration::from_micros(TICK_DURATION_MICROS));
        sim_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut patch_ticker =
            tokio::time::interval(Duration::from_micros(PATCH_INTERVAL_MICROS));
        patch_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(room_id = %self.id, "room started");

        loop {
            tokio::select! {
                _ = sim_ticker.tick() => self.tick(),
                _ = patch_ticker.tick() => self.broadcast_state(),
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_cmd(cmd),
                    None => break,
                },
            }

            if self.seats_taken > 0 && self.sessions.is_empty() {
                break;
            }
        }

        self.refuse_pending_joins(&mut cmd_rx);
        info!(room_id = %self.id, "room closed");
    }

    /// A join can race the room shutting down: the command lands on a channel
    /// whose receiving task is about to return. Answer every buffered join
    /// with an error so the sender knows to look for another room.
    fn refuse_pending_joins(&self, cmd_rx: &mut mpsc::UnboundedReceiver<RoomCmd>) {
        cmd_rx.close();
        while let Ok(cmd) = cmd_rx.try_recv() {
            if let RoomCmd::Join { session_id, tx, .. } = cmd {
                debug!(room_id = %self.id, %session_id, "join arrived after close, refusing");
                let _ = tx.send(ServerMsg::Error {
                    code: "room_closed".to_string(),
                    message: "room closed before the join was processed".to_string(),
                });
            }
        }
    }

    fn handle_cmd(&mut self, cmd: RoomCmd) {
        match cmd {
            RoomCmd::Join { session_id, uid, tx } => self.on_join(session_id, uid, tx),
            RoomCmd::Input {
                session_id,
                step,
                timestamp,
                keys,
            } => self.on_input(session_id, step, timestamp, &keys),
            RoomCmd::Leave { session_id } => self.on_leave(session_id),
        }
    }

    fn on_join(&mut self, session_id: Uuid, uid: String, tx: mpsc::UnboundedSender<ServerMsg>) {
        if self.sessions.len() >= MAX_CLIENTS || self.ended {
            let _ = tx.send(ServerMsg::Error {
                code: "room_full".to_string(),
                message: "room is no longer accepting players".to_string(),
            });
            return;
        }

        debug!(room_id = %self.id, %session_id, %uid, "player joined");
        let _ = tx.send(ServerMsg::Welcome {
            session_id,
            server_time: unix_millis(),
        });

        self.uids.insert(session_id, uid.clone());
        self.sessions.insert(session_id, Session { uid, tx });
        self.inputs.insert(session_id, InputManager::new());
        self.client_stats.insert(session_id, ClientStat::new());
        self.match_stats.insert(session_id, PlayerStats::default());
        self.world.create_tank(session_id);
        self.seats_taken += 1;

        if self.sessions.len() == MAX_CLIENTS {
            self.status = RoomStatus::Ready;
            info!(room_id = %self.id, "both players present, match is live");
        }
    }

    /// Queue one input command. Ignored until the match is live, so nobody
    /// gets a head start while the room is still matching.
    fn on_input(
        &mut self,
        session_id: Uuid,
        step: u32,
        timestamp: f64,
        keys: &HashMap<String, bool>,
    ) {
        if self.status != RoomStatus::Ready || self.ended {
            return;
        }
        let Some(mgr) = self.inputs.get_mut(&session_id) else {
            return;
        };
        let now = unix_millis() as f64;
        let avg_ping = match self.client_stats.get_mut(&session_id) {
            Some(stat) => {
                stat.ping(now);
                stat.avg_ping()
            }
            None => 0.0,
        };
        mgr.submit(step, timestamp, keys, avg_ping, now);
    }

    fn on_leave(&mut self, session_id: Uuid) {
        let Some(session) = self.sessions.remove(&session_id) else {
            return;
        };
        debug!(room_id = %self.id, %session_id, uid = %session.uid, "player left");
        self.inputs.remove(&session_id);
        self.client_stats.remove(&session_id);
        self.world.remove_tank(&session_id);

        // A desertion mid-match hands the win to whoever stayed
        if self.status == RoomStatus::Ready && !self.ended {
            let winner = self.sessions.keys().next().copied();
            self.end_match(winner, Some(session_id), session.uid.clone());
        }
    }

    fn tick(&mut self) {
        if self.status == RoomStatus::Ready && !self.ended {
            let events = self.world.update(&mut self.inputs);
            self.apply_events(&events);

            if !self.ended && self.world.sim_time_ms() >= MATCH_DURATION_MS {
                info!(room_id = %self.id, "match timer expired, calling a draw");
                self.end_draw();
            }
        }
    }

    fn apply_events(&mut self, events: &[WorldEvent]) {
        for event in events {
            match *event {
                WorldEvent::ShellLoaded { session_id } => {
                    self.send_to(&session_id, ServerMsg::Load {});
                }
                WorldEvent::ShellFired { session_id } => {
                    if let Some(stats) = self.match_stats.get_mut(&session_id) {
                        stats.log_shell_used();
                    }
                }
                WorldEvent::Hit {
                    shooter,
                    target,
                    part,
                    damage,
                } => {
                    debug!(room_id = %self.id, %shooter, %target, ?part, damage, "hit");
                    if let Some(stats) = self.match_stats.get_mut(&shooter) {
                        stats.log_damage(damage);
                    }
                }
                WorldEvent::HealthDepleted { session_id } => {
                    if self.ended {
                        continue;
                    }
                    let winner = self
                        .sessions
                        .keys()
                        .find(|sid| **sid != session_id)
                        .copied();
                    let loser_uid = self
                        .uids
                        .get(&session_id)
                        .cloned()
                        .unwrap_or_default();
                    info!(room_id = %self.id, loser = %session_id, "player eliminated");
                    self.end_match(winner, Some(session_id), loser_uid);
                }
            }
        }
    }

    fn broadcast_state(&mut self) {
        let players: HashMap<Uuid, _> = self
            .sessions
            .iter()
            .filter_map(|(sid, session)| {
                self.world
                    .player_snapshot(sid, &session.uid)
                    .map(|snap| (*sid, snap))
            })
            .collect();
        let msg = ServerMsg::State {
            status: self.status,
            players,
        };
        for session in self.sessions.values() {
            let _ = session.tx.send(msg.clone());
        }
    }

    /// Finish the match with an explicit winner. Idempotent; the first call
    /// wins and later triggers are ignored.
    fn end_match(&mut self, winner: Option<Uuid>, loser: Option<Uuid>, loser_uid: String) {
        if self.ended {
            return;
        }
        self.ended = true;

        let stats = self.finalize_stats();
        let winner_uid = winner.and_then(|sid| self.uids.get(&sid).cloned());

        let msg = ServerMsg::MatchEnd {
            winner,
            loser,
            is_draw: false,
            stats: stats.clone(),
        };
        for session in self.sessions.values() {
            let _ = session.tx.send(msg.clone());
        }

        if let Some(uid) = winner_uid {
            let points = winner
                .and_then(|sid| stats.player_stats.get(&sid))
                .map(|p| p.points)
                .unwrap_or(0);
            self.persist(uid, true, points);
        }
        if !loser_uid.is_empty() {
            let points = loser
                .and_then(|sid| stats.player_stats.get(&sid))
                .map(|p| p.points)
                .unwrap_or(0);
            self.persist(loser_uid, false, points);
        }
    }

    /// Timer expiry: nobody wins, both records still get the match
    fn end_draw(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;

        let stats = self.finalize_stats();
        let msg = ServerMsg::MatchEnd {
            winner: None,
            loser: None,
            is_draw: true,
            stats: stats.clone(),
        };
        for (sid, session) in &self.sessions {
            let _ = session.tx.send(msg.clone());
            let points = stats
                .player_stats
                .get(sid)
                .map(|p| p.points)
                .unwrap_or(0);
            self.persist(session.uid.clone(), false, points);
        }
    }

    fn finalize_stats(&mut self) -> MatchStats {
        let mut out = MatchStats::default();
        for (sid, stats) in self.match_stats.iter_mut() {
            stats.finalize();
            let uid = self.uids.get(sid).cloned().unwrap_or_default();
            out.player_stats.insert(
                *sid,
                PlayerMatchStats {
                    uid,
                    shells_used: stats.shells_used,
                    total_damage: stats.total_damage,
                    points: stats.points,
                },
            );
        }
        out
    }

    /// Fire-and-forget persistence. A failed write is logged and dropped so
    /// it can never hold up match-end delivery.
    fn persist(&self, uid: String, did_win: bool, points: u32) {
        let store = self.stats_store.clone();
        tokio::spawn(async move {
            if let Err(err) = store.update_player_stats(&uid, did_win, points).await {
                warn!(%uid, error = %err, "failed to persist match result");
            }
        });
    }

    fn send_to(&self, session_id: &Uuid, msg: ServerMsg) {
        if let Some(session) = self.sessions.get(session_id) {
            let _ = session.tx.send(msg);
        }
    }
}
