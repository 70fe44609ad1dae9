//! Dispatch and coordination behaviour, driven through the dispatcher
//! Run with: cargo test --test dispatch_test

mod common;

use async_trait::async_trait;
use std::time::Duration;

use cadence_bot::application::commands::{Command, CommandCatalog, CommandContext, CommandResult};
use cadence_bot::application::errors::CommandError;
use cadence_bot::application::messaging::RoleGuardMiddleware;
use cadence_bot::application::services::{EngineSettings, RenderView};
use cadence_bot::domain::entities::{CommandKind, Control, Interaction, Item, SessionId};
use cadence_bot::domain::traits::{Acknowledgement, MediaPlayer};
use cadence_bot::{DispatchOutcome, DropReason, InteractionDispatcher};
use common::{settings, Harness};

fn page_forward(user: &str) -> Interaction {
    Interaction::button("guild", user, ">")
}

#[tokio::test(start_paused = true)]
async fn test_double_click_executes_once_and_acks_both() {
    let h = Harness::new(settings(3));
    h.seed("guild", 5).await;
    h.connect("guild").await;

    let first = page_forward("alice");
    let second = page_forward("bob");
    assert_eq!(
        h.dispatcher.dispatch(first.clone()).await,
        DispatchOutcome::Scheduled {
            kind: CommandKind::PageForward,
            delay: Duration::from_millis(100),
        }
    );
    assert_eq!(
        h.dispatcher.dispatch(second.clone()).await,
        DispatchOutcome::Deferred(CommandKind::PageForward)
    );
    h.dispatcher.wait_idle().await;

    assert_eq!(h.session("guild").await.unwrap().offset, 3);
    assert_eq!(h.bot.acks_for(&first), vec![Acknowledgement::Update]);
    assert_eq!(h.bot.acks_for(&second), vec![Acknowledgement::Update]);
    assert!(h.services().coordinator.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_deferred_clicks_are_acked_in_arrival_order() {
    let h = Harness::new(settings(3));
    h.seed("guild", 5).await;
    h.connect("guild").await;

    let clicks: Vec<Interaction> = ["a", "b", "c", "d"].iter().map(|u| page_forward(u)).collect();
    for click in &clicks {
        h.dispatcher.dispatch(click.clone()).await;
    }
    assert_eq!(h.services().coordinator.pending_count(CommandKind::PageForward, &SessionId::new("guild")), 3);
    h.dispatcher.wait_idle().await;

    let order: Vec<String> = h.bot.acks().into_iter().map(|(id, _)| id).collect();
    let expected: Vec<String> = clicks.iter().map(|c| c.id.clone()).collect();
    assert_eq!(order, expected);
    assert_eq!(h.session("guild").await.unwrap().offset, 3);
}

#[tokio::test(start_paused = true)]
async fn test_click_after_completion_runs_again() {
    let h = Harness::new(settings(3));
    h.seed("guild", 5).await;
    h.connect("guild").await;

    h.dispatcher.dispatch(page_forward("alice")).await;
    h.dispatcher.wait_idle().await;
    let outcome = h.dispatcher.dispatch(page_forward("alice")).await;
    assert!(matches!(outcome, DispatchOutcome::Scheduled { .. }));
    h.dispatcher.wait_idle().await;

    // 5 items with 3 per page wrap back to the first page
    assert_eq!(h.session("guild").await.unwrap().offset, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failing_body_fails_every_waiting_click() {
    let h = Harness::new(settings(3));
    h.seed("guild", 2).await;
    h.connect("guild").await;
    h.store.fail_saves(true);

    let first = Interaction::button("guild", "alice", "Loop");
    let second = Interaction::button("guild", "bob", "Loop");
    h.dispatcher.dispatch(first.clone()).await;
    assert_eq!(
        h.dispatcher.dispatch(second.clone()).await,
        DispatchOutcome::Deferred(CommandKind::Loop)
    );
    h.dispatcher.wait_idle().await;

    let guild = SessionId::new("guild");
    assert!(!h.services().coordinator.is_in_flight(CommandKind::Loop, &guild));
    assert!(h.bot.acks_for(&first)[0].is_failure());
    assert!(h.bot.acks_for(&second)[0].is_failure());
    assert!(h.session("guild").await.unwrap().flags.is_empty());
}

struct Exploding;

#[async_trait]
impl Command for Exploding {
    fn kind(&self) -> CommandKind {
        CommandKind::Pause
    }

    fn description(&self) -> &'static str {
        "Always panics"
    }

    fn control(&self, _view: &RenderView<'_>) -> Option<Control> {
        Some(Control::button(CommandKind::Pause, "Pause"))
    }

    async fn execute(&self, _ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        panic!("command blew up")
    }
}

#[tokio::test(start_paused = true)]
async fn test_panicking_body_is_contained() {
    let mut catalog = CommandCatalog::standard();
    catalog.register(Exploding);
    let h = Harness::with_catalog(settings(3), catalog);
    h.seed("guild", 1).await;

    let first = Interaction::button("guild", "alice", "Pause");
    let second = Interaction::button("guild", "bob", "Pause");
    h.dispatcher.dispatch(first.clone()).await;
    h.dispatcher.dispatch(second.clone()).await;
    h.dispatcher.wait_idle().await;

    assert!(h.bot.acks_for(&first)[0].is_failure());
    assert!(h.bot.acks_for(&second)[0].is_failure());
    assert!(h.services().coordinator.is_empty());

    // The key is usable again
    let third = Interaction::button("guild", "carol", "Pause");
    assert!(matches!(h.dispatcher.dispatch(third).await, DispatchOutcome::Scheduled { .. }));
    h.dispatcher.wait_idle().await;
}

/// Refreshes the status, then fails
struct RefreshThenFail;

#[async_trait]
impl Command for RefreshThenFail {
    fn kind(&self) -> CommandKind {
        CommandKind::Loop
    }

    fn description(&self) -> &'static str {
        "Fails after queueing a refresh"
    }

    fn control(&self, _view: &RenderView<'_>) -> Option<Control> {
        Some(Control::button(CommandKind::Loop, "Loop"))
    }

    async fn execute(&self, ctx: &CommandContext, _interaction: &Interaction) -> CommandResult {
        ctx.refresh_status();
        tokio::time::sleep(Duration::from_millis(50)).await;
        Err(CommandError::ExecutionFailed("gave up after refreshing".to_string()))
    }
}

#[tokio::test(start_paused = true)]
async fn test_body_failing_after_refresh_fails_waiting_clicks() {
    let mut catalog = CommandCatalog::standard();
    catalog.register(RefreshThenFail);
    let h = Harness::with_catalog(settings(3), catalog);
    h.seed("guild", 2).await;
    h.connect("guild").await;

    let first = Interaction::button("guild", "alice", "Loop");
    let second = Interaction::button("guild", "bob", "Loop");
    h.dispatcher.dispatch(first.clone()).await;
    assert_eq!(
        h.dispatcher.dispatch(second.clone()).await,
        DispatchOutcome::Deferred(CommandKind::Loop)
    );
    h.dispatcher.wait_idle().await;

    assert_eq!(h.bot.render_count(), 1);
    assert!(h.bot.acks_for(&first)[0].is_failure());
    assert_eq!(h.bot.acks_for(&second).len(), 1);
    assert!(h.bot.acks_for(&second)[0].is_failure());
    assert!(h.services().coordinator.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_distinct_sessions_execute_independently() {
    let h = Harness::new(settings(3));
    for group in ["one", "two"] {
        h.seed(group, 5).await;
        h.connect(group).await;
    }

    let a = h.dispatcher.dispatch(Interaction::button("one", "alice", ">")).await;
    let b = h.dispatcher.dispatch(Interaction::button("two", "bob", ">")).await;
    assert!(matches!(a, DispatchOutcome::Scheduled { .. }));
    assert!(matches!(b, DispatchOutcome::Scheduled { .. }));
    h.dispatcher.wait_idle().await;

    assert_eq!(h.session("one").await.unwrap().offset, 3);
    assert_eq!(h.session("two").await.unwrap().offset, 3);
}

#[tokio::test(start_paused = true)]
async fn test_different_kinds_interleave() {
    let h = Harness::new(settings(3));
    h.seed("guild", 5).await;
    h.connect("guild").await;

    let paging = h.dispatcher.dispatch(page_forward("alice")).await;
    let looping = h.dispatcher.dispatch(Interaction::button("guild", "bob", "Loop")).await;
    assert!(matches!(paging, DispatchOutcome::Scheduled { .. }));
    assert!(matches!(looping, DispatchOutcome::Scheduled { .. }));
    h.dispatcher.wait_idle().await;
}

#[tokio::test(start_paused = true)]
async fn test_help_always_executes() {
    let h = Harness::new(settings(3));
    h.seed("guild", 0).await;

    let first = Interaction::button("guild", "alice", "Help");
    let second = Interaction::button("guild", "bob", "Help");
    assert_eq!(
        h.dispatcher.dispatch(first.clone()).await,
        DispatchOutcome::Executing(CommandKind::Help)
    );
    assert_eq!(
        h.dispatcher.dispatch(second.clone()).await,
        DispatchOutcome::Executing(CommandKind::Help)
    );
    assert!(!h.services().coordinator.is_tracked(CommandKind::Help, &SessionId::new("guild")));
    h.dispatcher.wait_idle().await;

    for click in [&first, &second] {
        match &h.bot.acks_for(click)[..] {
            [Acknowledgement::Reply { content, ephemeral: true }] => assert!(content.contains("page-forward")),
            other => panic!("unexpected acks: {:?}", other),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_unresolvable_events_are_dropped_silently() {
    let h = Harness::new(settings(3));

    let orphan = Interaction::button("nowhere", "alice", ">");
    assert_eq!(
        h.dispatcher.dispatch(orphan).await,
        DispatchOutcome::Dropped(DropReason::NoSession)
    );

    h.seed("guild", 5).await;
    // Paging controls are hidden until the session is connected
    assert_eq!(
        h.dispatcher.dispatch(page_forward("alice")).await,
        DispatchOutcome::Dropped(DropReason::NoMatch)
    );
    assert_eq!(
        h.dispatcher.dispatch(Interaction::button("guild", "alice", "Dance")).await,
        DispatchOutcome::Dropped(DropReason::NoMatch)
    );
    h.dispatcher.wait_idle().await;
    assert!(h.bot.acks().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_zero_flush_delay_completes_without_refresh() {
    let h = Harness::new(EngineSettings {
        flush_delay: Duration::ZERO,
        ..settings(3)
    });
    h.seed("guild", 1).await;
    h.connect("guild").await;

    // Skip on a paused player is a no-op that queues no refresh
    let player = h.services().resources.player(&SessionId::new("guild")).unwrap();
    player.play(&Item::new("song"));
    player.pause();
    let first = Interaction::button("guild", "alice", "Skip");
    let second = Interaction::button("guild", "bob", "Skip");
    h.dispatcher.dispatch(first.clone()).await;
    h.dispatcher.dispatch(second.clone()).await;
    h.dispatcher.wait_idle().await;

    assert_eq!(h.bot.acks_for(&second), vec![Acknowledgement::Update]);
    assert!(h.services().coordinator.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_role_guard_rejects_with_reply() {
    let h = Harness::new(settings(3));
    h.seed("guild", 5).await;
    h.connect("guild").await;
    let dispatcher =
        InteractionDispatcher::new(h.services().clone()).with_middleware(RoleGuardMiddleware::new(["DJ"]));

    let click = page_forward("alice");
    assert_eq!(
        dispatcher.dispatch(click.clone()).await,
        DispatchOutcome::Dropped(DropReason::Rejected)
    );
    assert!(matches!(
        &h.bot.acks_for(&click)[..],
        [Acknowledgement::Reply { ephemeral: true, .. }]
    ));

    let allowed = page_forward("bob").with_roles(vec!["DJ".to_string()]);
    assert!(matches!(dispatcher.dispatch(allowed).await, DispatchOutcome::Scheduled { .. }));
    dispatcher.wait_idle().await;
}
