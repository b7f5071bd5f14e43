//! Seeded simulations driving the game crate the way two real clients
//! would, with protocol invariants checked at every step.
use anyhow::{Context, Result, ensure};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::cell::RefCell;
use std::rc::Rc;

use lorekeys_game::{
    Catalog, Category, ClientError, CompletionOutcome, DuelError, DuelGameClient, GameMode,
    GameSession, GameState, InMemoryRemote, NodeStatus, NullGuildStore, ProgressionError,
    QuestGraph, QuestionKind, RiddleNode, TargetZone, UnlockKind, WAGER_PRESETS,
    apply_remote_session,
};

const CATEGORY_ID: &str = "cat-sim";

fn riddle(order: u32) -> RiddleNode {
    RiddleNode {
        id: format!("node-{order}"),
        title: format!("Riddle {order}"),
        order,
        status: NodeStatus::Locked,
        question_kind: QuestionKind::Year,
        question: String::from("In which year?"),
        media_url: None,
        options: Vec::new(),
        answer: String::from("1453"),
        unlock_kind: UnlockKind::Math,
        unlock_prompt: String::from("(digit_sum * 2)"),
        unlock_options: Vec::new(),
        unlock_answer: String::from("26"),
        location_hint: String::new(),
        map_image_url: String::new(),
        target_zone: TargetZone::default(),
        reward_key_id: format!("KEY-{order}"),
    }
}

fn feed(node_count: usize) -> Catalog {
    let nodes = (0..node_count)
        .map(|order| riddle(u32::try_from(order).unwrap_or(u32::MAX)))
        .collect();
    Catalog {
        categories: vec![Category {
            id: CATEGORY_ID.to_string(),
            name: String::from("Simulated Age"),
            description: String::new(),
            image_url: None,
            order: 0,
            graph: QuestGraph::from_nodes(nodes),
        }],
        periods: Vec::new(),
    }
}

fn now_base() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Independent restatement of the reward rules: one 250 XP grant per
/// completion with a single-step level check.
fn expect_progress(completions: u32) -> (u32, u32) {
    let (mut level, mut xp) = (1_u32, 0_u32);
    for _ in 0..completions {
        xp += 250;
        if xp >= level * 1_000 {
            level += 1;
            xp = 0;
        }
    }
    (level, xp)
}

fn expect_win(level: u32, xp: u32, wager: u32) -> (u32, u32) {
    let mut xp = xp + wager;
    let mut level = level;
    if xp >= level * 1_000 {
        level += 1;
        xp = 0;
    }
    (level, xp)
}

pub fn run_solo_sim(seed: u64, verbose: bool) -> Result<Vec<String>> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let node_count = rng.gen_range(2..=8_usize);
    let mut details = vec![format!("solo sweep over {node_count} nodes")];

    let mut session = GameSession::new(GameState::setup("u-solo", &["Wardens"], feed(node_count)));
    session
        .begin_category(CATEGORY_ID)
        .context("category from the simulated feed must exist")?;

    for order in 0..node_count {
        let node_id = {
            let graph = session.state().active_graph().context("graph missing")?;
            ensure!(graph.is_well_formed(), "single-available invariant broken");
            graph
                .available_node()
                .context("a node must be available mid-run")?
                .id
                .clone()
        };

        // Probe a locked node first every now and then; it must be rejected
        // without any effect.
        if order + 1 < node_count && rng.gen_bool(0.3) {
            let locked_id = format!("node-{}", node_count - 1);
            let result = session.complete_node(&locked_id, &NullGuildStore);
            ensure!(
                matches!(
                    result,
                    Err(lorekeys_game::CommandError::Progression(
                        ProgressionError::InvalidNodeState { .. }
                    ))
                ),
                "locked node {locked_id} must be rejected"
            );
        }

        let outcome = session.complete_node(&node_id, &NullGuildStore)?;
        ensure!(outcome.reward().is_some(), "completion must pay out");

        // Duplicate probes must be explicit no-ops.
        if rng.gen_bool(0.5) {
            let replay = session.complete_node(&node_id, &NullGuildStore)?;
            ensure!(
                replay == CompletionOutcome::AlreadyCompleted,
                "duplicate completion must be a no-op"
            );
        }
        if verbose {
            println!("  completed {node_id}");
        }
    }

    let completions = u32::try_from(node_count).unwrap_or(u32::MAX);
    let (level, xp) = expect_progress(completions);
    let state = session.state();
    ensure!(
        state.teams[0].score == completions * 150,
        "team score must be 150 per node"
    );
    ensure!(state.teams[0].current_stage == completions, "stage mismatch");
    ensure!(
        state.user.level == level && state.user.xp == xp,
        "xp/level drifted from the single-step rule (expected {level}/{xp}, got {}/{})",
        state.user.level,
        state.user.xp
    );
    ensure!(
        state.active_graph().is_some_and(|graph| graph.available_node().is_none()),
        "a finished category has no available node"
    );
    details.push(format!("final level {level}, xp {xp}"));
    Ok(details)
}

struct DuelRig {
    challenger: DuelGameClient<InMemoryRemote>,
    recipient: DuelGameClient<InMemoryRemote>,
    node_count: usize,
    wager: u32,
    clock: i64,
}

impl DuelRig {
    async fn start(node_count: usize, wager: u32) -> Result<Self> {
        let remote = InMemoryRemote::new();
        let challenger_state = Rc::new(RefCell::new(GameState::setup(
            "u-challenger",
            &["Alp"],
            feed(node_count),
        )));
        let recipient_state = Rc::new(RefCell::new(GameState::setup(
            "u-recipient",
            &["Asena"],
            feed(node_count),
        )));
        let mut challenger = DuelGameClient::new(Rc::new(remote.clone()), challenger_state);
        let mut recipient = DuelGameClient::new(Rc::new(remote), recipient_state);
        challenger.watch_invites()?;
        recipient.watch_invites()?;

        let clock = now_base();
        challenger.challenge("inv-sim", "u-recipient", clock).await?;
        recipient
            .accept_invite("inv-sim", wager, CATEGORY_ID, clock + 1)
            .await?;
        challenger.join_session("inv-sim").await?;
        Ok(Self {
            challenger,
            recipient,
            node_count,
            wager,
            clock,
        })
    }

    fn turn_holder(&self) -> Result<String> {
        let state = self.challenger.state();
        let state = state.borrow();
        Ok(state
            .duel
            .as_ref()
            .context("challenger mirror must exist")?
            .current_turn_user_id
            .clone())
    }

    async fn play_out(&mut self, verbose: bool) -> Result<()> {
        let mut last_scores = (0_u32, 0_u32);
        for turn in 0..self.node_count {
            let holder = self.turn_holder()?;
            let actor = if holder == "u-challenger" {
                &mut self.challenger
            } else {
                &mut self.recipient
            };
            let node_id = {
                let state = actor.state();
                let state = state.borrow();
                state
                    .active_graph()
                    .and_then(|graph| graph.available_node())
                    .context("actor must have an available node")?
                    .id
                    .clone()
            };
            self.clock += 10;
            actor
                .submit_move(&node_id, &NullGuildStore, self.clock)
                .await?;
            if verbose {
                println!("  move {turn}: {holder} answered {node_id}");
            }

            let state = self.challenger.state();
            let state = state.borrow();
            let mirror = state.duel.as_ref().context("mirror lost mid-duel")?;
            let scores = (mirror.player1.score, mirror.player2.score);
            ensure!(
                scores.0 >= last_scores.0 && scores.1 >= last_scores.1,
                "duel scores must be monotonic"
            );
            ensure!(
                mirror.moves.len() == turn + 1,
                "move log must grow by exactly one"
            );
            let expected_holder = if (turn + 1) % 2 == 0 {
                "u-challenger"
            } else {
                "u-recipient"
            };
            ensure!(
                mirror.current_turn_user_id == expected_holder,
                "turn token must alternate strictly"
            );
            last_scores = scores;
        }
        Ok(())
    }

    async fn settle(&mut self, details: &mut Vec<String>) -> Result<()> {
        let settlement = self
            .challenger
            .check_completion()
            .await?
            .context("full move log must settle")?;
        details.push(match settlement.winner_id.as_deref() {
            Some(winner) => format!("settled: {winner} takes {} XP", self.wager),
            None => String::from("settled: draw, wager untouched"),
        });

        // Any number of further checks is harmless, from either side.
        ensure!(self.challenger.check_completion().await?.is_none(), "resettled");
        ensure!(self.recipient.check_completion().await?.is_none(), "resettled");
        Ok(())
    }

    fn verify_final(&self) -> Result<()> {
        let challenger_moves = u32::try_from(self.node_count.div_ceil(2)).unwrap_or(u32::MAX);
        let recipient_moves = u32::try_from(self.node_count / 2).unwrap_or(u32::MAX);
        let challenger_won = self.node_count % 2 == 1;

        let (mut level1, mut xp1) = expect_progress(challenger_moves);
        let (level2, mut xp2) = expect_progress(recipient_moves);
        if challenger_won {
            (level1, xp1) = expect_win(level1, xp1, self.wager);
            xp2 = xp2.saturating_sub(self.wager);
        }

        for (client, level, xp) in [
            (&self.challenger, level1, xp1),
            (&self.recipient, level2, xp2),
        ] {
            let state = client.state();
            let state = state.borrow();
            ensure!(
                state.user.level == level && state.user.xp == xp,
                "settled xp drifted (expected {level}/{xp}, got {}/{})",
                state.user.level,
                state.user.xp
            );
            ensure!(state.mode == GameMode::Solo, "mode must reset to solo");
            ensure!(state.active_duel_id.is_none(), "duel binding must clear");
            ensure!(state.active_wager.is_none(), "wager binding must clear");
        }
        Ok(())
    }
}

pub async fn run_duel_sim(seed: u64, verbose: bool) -> Result<Vec<String>> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let node_count = rng.gen_range(1..=6_usize);
    let wager = WAGER_PRESETS[rng.gen_range(0..WAGER_PRESETS.len())];
    let mut details = vec![format!("duel over {node_count} nodes, wager {wager}")];

    let mut rig = DuelRig::start(node_count, wager).await?;
    rig.play_out(verbose).await?;

    // Replay the final pre-settlement document; the version guard must
    // drop it on both sides.
    {
        let state_handle = rig.challenger.state();
        let snapshot = state_handle.borrow().duel.clone().context("mirror")?;
        let events = apply_remote_session(&mut state_handle.borrow_mut(), &snapshot);
        ensure!(
            matches!(
                events.as_slice(),
                [lorekeys_game::DuelEvent::StalePatchDropped { .. }]
            ),
            "replayed document must be dropped as stale"
        );
    }

    rig.settle(&mut details).await?;
    rig.verify_final()?;
    Ok(details)
}

pub async fn run_offturn_sim(seed: u64, verbose: bool) -> Result<Vec<String>> {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let node_count = rng.gen_range(2..=4_usize);
    let wager = WAGER_PRESETS[rng.gen_range(0..WAGER_PRESETS.len())];
    let mut details = vec![format!("off-turn probes over {node_count} nodes")];

    let mut rig = DuelRig::start(node_count, wager).await?;

    // The recipient never holds the first turn.
    let early = rig
        .recipient
        .submit_move("node-0", &NullGuildStore, now_base())
        .await;
    ensure!(
        matches!(early, Err(ClientError::Duel(DuelError::OffTurn { .. }))),
        "recipient must be rejected before the challenger moves"
    );
    {
        let state = rig.recipient.state();
        let state = state.borrow();
        let mirror = state.duel.as_ref().context("mirror")?;
        ensure!(mirror.moves.is_empty(), "rejected move must not be logged");
        ensure!(state.user.xp == 0, "rejected move must not pay XP");
    }

    rig.play_out(verbose).await?;

    // Whoever just moved is immediately off turn again (unless the duel is
    // already over, where the finished guard answers instead).
    let holder = rig.turn_holder()?;
    let off_actor = if holder == "u-challenger" {
        &mut rig.recipient
    } else {
        &mut rig.challenger
    };
    let node_id = {
        let state = off_actor.state();
        let state = state.borrow();
        state
            .active_graph()
            .and_then(|graph| graph.available_node())
            .map(|node| node.id.clone())
    };
    if let Some(node_id) = node_id {
        let result = off_actor.submit_move(&node_id, &NullGuildStore, now_base()).await;
        ensure!(
            matches!(result, Err(ClientError::Duel(DuelError::OffTurn { .. }))),
            "moving twice in a row must be rejected"
        );
    }

    rig.settle(&mut details).await?;
    rig.verify_final()?;
    Ok(details)
}

pub async fn run_wager_sweep(_seed: u64, verbose: bool) -> Result<Vec<String>> {
    let mut details = Vec::new();
    for wager in WAGER_PRESETS {
        // A single-node category: the challenger answers it and wins.
        let mut rig = DuelRig::start(1, wager).await?;
        rig.play_out(verbose).await?;
        rig.settle(&mut details).await?;
        rig.verify_final()?;

        let state = rig.recipient.state();
        let state = state.borrow();
        ensure!(
            state.user.xp == 0,
            "loser with no completions is clamped at zero"
        );
        details.push(format!("wager {wager} settled and clamped"));
    }
    Ok(details)
}
