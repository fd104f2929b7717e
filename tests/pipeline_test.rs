use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use http::{StatusCode, Uri};
use matchbox_http::context::Key;
use matchbox_http::middleware::{CountRequests, GroupResolver, ProfileResolver, RequestLogger};
use matchbox_http::{
    BufferedResponse, Context, Group, Handler, LabelSet, MatchError, Matcher, Middleware,
    Pipeline, Profile, Request, RequestTally, ResponseWriter, Router, group_from, handler,
    profile_from, with_group,
};

// ── Test engine ───────────────────────────────────────────────────────────────

/// Matches by the `uuid` label and records every label set it is handed.
#[derive(Default)]
struct Engine {
    groups: HashMap<String, Group>,
    profiles: HashMap<String, Profile>,
    fail: bool,
    jitter: bool,
    calls: Mutex<Vec<(&'static str, LabelSet)>>,
}

impl Engine {
    fn with_machine(mut self, uuid: &str, group: &str, profile: &str) -> Self {
        self.groups.insert(
            uuid.to_owned(),
            Group { id: group.to_owned(), profile: profile.to_owned(), ..Group::default() },
        );
        self.profiles
            .insert(uuid.to_owned(), Profile { id: profile.to_owned(), ..Profile::default() });
        self
    }

    fn failing() -> Self {
        Self { fail: true, ..Self::default() }
    }

    fn calls(&self, kind: &str) -> Vec<LabelSet> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, labels)| labels.clone())
            .collect()
    }

    async fn pause(&self, labels: &LabelSet) {
        if !self.jitter {
            return;
        }
        let n: u64 = labels.get("uuid").and_then(|u| u.parse().ok()).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis((n * 7) % 5)).await;
    }
}

#[async_trait]
impl Matcher for Engine {
    async fn select_group(&self, labels: &LabelSet) -> Result<Group, MatchError> {
        self.calls.lock().unwrap().push(("group", labels.clone()));
        self.pause(labels).await;
        if self.fail {
            return Err(MatchError::Engine("store unavailable".to_owned()));
        }
        labels
            .get("uuid")
            .and_then(|uuid| self.groups.get(uuid))
            .cloned()
            .ok_or(MatchError::NoMatchingGroup)
    }

    async fn select_profile(&self, labels: &LabelSet) -> Result<Profile, MatchError> {
        self.calls.lock().unwrap().push(("profile", labels.clone()));
        self.pause(labels).await;
        if self.fail {
            return Err(MatchError::Engine("store unavailable".to_owned()));
        }
        labels
            .get("uuid")
            .and_then(|uuid| self.profiles.get(uuid))
            .cloned()
            .ok_or(MatchError::NoMatchingProfile)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// What a terminal handler saw in its context.
#[derive(Debug, Default, Clone, PartialEq)]
struct Seen {
    group: Option<Group>,
    profile: Option<Profile>,
}

fn recording_terminal(seen: Arc<Mutex<Vec<Seen>>>) -> Router {
    Router::new().route(
        "/ipxe",
        handler::from_fn(move |req, w| {
            let ctx = req.context();
            seen.lock().unwrap().push(Seen {
                group: group_from(ctx).cloned(),
                profile: profile_from(ctx).cloned(),
            });
            let _ = w.write_all(b"#!ipxe\n");
        }),
    )
}

fn request(uri: &str) -> Request {
    Request::builder().uri(uri.parse::<Uri>().unwrap()).build()
}

async fn serve(app: &impl Handler, req: Request) -> BufferedResponse {
    let mut out = BufferedResponse::new();
    app.serve(req, &mut out).await;
    out
}

// ── Resolution ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn resolved_entities_reach_the_terminal_handler() {
    let engine = Arc::new(Engine::default().with_machine("node1", "workers", "fedora-coreos"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let app = Pipeline::builder(engine.clone())
        .counter(Arc::new(RequestTally::new()))
        .build(recording_terminal(seen.clone()));

    let out = serve(&app, request("/ipxe?uuid=node1")).await;

    assert_eq!(out.status(), StatusCode::OK);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].group.as_ref(), engine.groups.get("node1"));
    assert_eq!(seen[0].profile.as_ref(), engine.profiles.get("node1"));
}

#[tokio::test]
async fn unmatched_machine_still_reaches_the_terminal_handler() {
    let engine = Arc::new(Engine::default().with_machine("node1", "workers", "fedora-coreos"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let app = Pipeline::builder(engine)
        .counter(Arc::new(RequestTally::new()))
        .build(recording_terminal(seen.clone()));

    let out = serve(&app, request("/ipxe?uuid=stranger")).await;

    assert_eq!(out.status(), StatusCode::OK);
    assert_eq!(*seen.lock().unwrap(), vec![Seen::default()]);
}

#[tokio::test]
async fn engine_failure_leaves_the_context_as_it_was() {
    struct Marker;
    impl Key for Marker {
        type Value = &'static str;
        const NAME: &'static str = "marker";
    }

    let engine = Arc::new(Engine::failing());
    let observed = Arc::new(Mutex::new(None));
    let sink = observed.clone();
    let terminal = handler::from_fn(move |req, _| {
        *sink.lock().unwrap() = Some(format!("{:?}", req.context()));
        assert_eq!(req.context().value::<Marker>(), Some(&"upstream"));
    });
    let app = Pipeline::builder(engine.clone())
        .counter(Arc::new(RequestTally::new()))
        .build(terminal);

    let ctx = Context::new().with_value::<Marker>("upstream");
    let before = format!("{ctx:?}");
    serve(&app, request("/ipxe?uuid=node1").with_context(ctx)).await;

    assert_eq!(observed.lock().unwrap().as_deref(), Some(before.as_str()));
    assert_eq!(engine.calls("group").len(), 1);
    assert_eq!(engine.calls("profile").len(), 1);
}

#[tokio::test]
async fn attached_group_is_never_replaced() {
    let engine = Arc::new(Engine::default().with_machine("node1", "workers", "fedora-coreos"));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let app = Pipeline::builder(engine.clone())
        .counter(Arc::new(RequestTally::new()))
        .build(recording_terminal(seen.clone()));

    let pinned = Group { id: "pinned".to_owned(), ..Group::default() };
    let req = request("/ipxe?uuid=node1").with_context(with_group(&Context::new(), pinned.clone()));
    serve(&app, req).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].group.as_ref(), Some(&pinned));
    assert!(engine.calls("group").is_empty());
    assert_eq!(seen[0].profile.as_ref().map(|p| p.id.as_str()), Some("fedora-coreos"));
}

#[tokio::test]
async fn resolver_order_does_not_matter() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut results = Vec::new();

    for group_first in [true, false] {
        let engine: Arc<dyn Matcher> =
            Arc::new(Engine::default().with_machine("node1", "workers", "fedora-coreos"));
        let group: Arc<dyn Middleware> = Arc::new(GroupResolver::new(engine.clone()));
        let profile: Arc<dyn Middleware> = Arc::new(ProfileResolver::new(engine));
        let stages = if group_first { vec![group, profile] } else { vec![profile, group] };
        let app = Pipeline::from_stages(stages, Arc::new(recording_terminal(seen.clone())));

        serve(&app, request("/ipxe?uuid=node1")).await;
        results.push(seen.lock().unwrap().pop().unwrap());
    }

    assert_eq!(results[0], results[1]);
    assert!(results[0].group.is_some());
    assert!(results[0].profile.is_some());
}

#[tokio::test]
async fn resolvers_extract_labels_independently() {
    let engine = Arc::new(Engine::default().with_machine("node1", "workers", "fedora-coreos"));
    let matcher: Arc<dyn Matcher> = engine.clone();

    let group = GroupResolver::new(matcher.clone()).with_labels(Arc::new(|req: &Request| {
        let mut labels = LabelSet::new();
        labels.insert("uuid".to_owned(), "node1".to_owned());
        labels.insert("stage".to_owned(), format!("group:{}", req.path()));
        labels
    }));
    let profile = ProfileResolver::new(matcher);

    // Profile runs first here, so a leak would show up in the group call.
    let stages: Vec<Arc<dyn Middleware>> = vec![Arc::new(profile), Arc::new(group)];
    let app = Pipeline::from_stages(stages, Arc::new(Router::new()));
    serve(&app, request("/ipxe?uuid=node1&os=installed")).await;

    let profile_calls = engine.calls("profile");
    let group_calls = engine.calls("group");
    assert_eq!(profile_calls.len(), 1);
    assert_eq!(group_calls.len(), 1);

    assert_eq!(profile_calls[0].get("os").map(String::as_str), Some("installed"));
    assert!(!profile_calls[0].contains_key("stage"));

    assert_eq!(group_calls[0].get("stage").map(String::as_str), Some("group:/ipxe"));
    assert!(!group_calls[0].contains_key("os"));
}

#[tokio::test]
async fn concurrent_requests_see_only_their_own_entities() {
    let mut engine = Engine { jitter: true, ..Engine::default() };
    for n in 0..32 {
        if n % 3 != 0 {
            engine = engine.with_machine(&n.to_string(), &format!("group-{n}"), &format!("profile-{n}"));
        }
    }
    let terminal = handler::from_fn(|req, w| {
        let ctx = req.context();
        let group = group_from(ctx).map_or("-", |g| g.id.as_str());
        let profile = profile_from(ctx).map_or("-", |p| p.id.as_str());
        let _ = write!(w, "{group} {profile}");
    });
    let app = Arc::new(
        Pipeline::builder(Arc::new(engine))
            .counter(Arc::new(RequestTally::new()))
            .build(Router::new().route("/ipxe", terminal)),
    );

    let tasks: Vec<_> = (0..32)
        .map(|n| {
            let app = Arc::clone(&app);
            tokio::spawn(async move {
                let out = serve(app.as_ref(), request(&format!("/ipxe?uuid={n}"))).await;
                (n, String::from_utf8(out.body().to_vec()).unwrap())
            })
        })
        .collect();

    for task in tasks {
        let (n, body) = task.await.unwrap();
        let expected = if n % 3 == 0 {
            "- -".to_owned()
        } else {
            format!("group-{n} profile-{n}")
        };
        assert_eq!(body, expected, "request {n}");
    }
}

// ── Counting ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn each_request_is_counted_once_with_its_final_status() {
    let tally = Arc::new(RequestTally::new());
    let engine = Arc::new(Engine::default());
    let terminal = Router::new()
        .route(
            "/teapot",
            handler::from_fn(|_, w| {
                w.write_status(StatusCode::IM_A_TEAPOT);
                let _ = w.write_all(b"short and stout");
                w.write_status(StatusCode::OK);
            }),
        )
        .route("/implicit", handler::from_fn(|_, w| {
            let _ = w.write_all(b"no status set");
        }))
        .route("/empty", handler::from_fn(|_, _| {}));
    let app = Pipeline::builder(engine).counter(tally.clone()).build(terminal);

    let cases = [
        ("/teapot", StatusCode::IM_A_TEAPOT),
        ("/implicit", StatusCode::OK),
        ("/empty", StatusCode::OK),
        ("/", StatusCode::OK),
        ("/nowhere", StatusCode::NOT_FOUND),
    ];
    for (path, expected) in cases {
        let out = serve(&app, request(path)).await;
        assert_eq!(out.status(), expected, "{path}");
        assert_eq!(tally.get(path, expected), 1, "{path}");
    }
    assert_eq!(tally.total(), cases.len() as u64);
}

#[tokio::test]
async fn counter_uses_the_path_without_query() {
    let tally = Arc::new(RequestTally::new());
    let app = Pipeline::builder(Arc::new(Engine::default()))
        .counter(tally.clone())
        .build(Router::new());

    serve(&app, request("/?mac=52:54:00:a1:9c:ae")).await;
    serve(&app, request("/?uuid=abc")).await;

    assert_eq!(tally.get("/", StatusCode::OK), 2);
}

#[tokio::test]
async fn counter_keeps_the_path_percent_encoded() {
    let tally = Arc::new(RequestTally::new());
    let app = Pipeline::builder(Arc::new(Engine::default()))
        .counter(tally.clone())
        .build(Router::new());

    serve(&app, request("/foo%20bar")).await;

    assert_eq!(tally.get("/foo%20bar", StatusCode::NOT_FOUND), 1);
    assert_eq!(tally.get("/foo bar", StatusCode::NOT_FOUND), 0);
}

#[tokio::test]
async fn counter_sees_status_written_after_resolution_failure() {
    let tally = Arc::new(RequestTally::new());
    let ipxe = handler::from_fn(|req, w| {
        if group_from(req.context()).is_none() {
            let _ = matchbox_http::home::not_found(w);
            return;
        }
        let _ = w.write_all(b"#!ipxe\n");
    });
    let app = Pipeline::builder(Arc::new(Engine::failing()))
        .counter(tally.clone())
        .build(Router::new().route("/ipxe", ipxe));

    let out = serve(&app, request("/ipxe?uuid=node1")).await;

    assert_eq!(out.status(), StatusCode::NOT_FOUND);
    assert_eq!(tally.get("/ipxe", StatusCode::NOT_FOUND), 1);
    assert_eq!(tally.get("/ipxe", StatusCode::OK), 0);
}

// ── Root and fallback ─────────────────────────────────────────────────────────

#[tokio::test]
async fn root_answers_regardless_of_resolution() {
    for engine in [
        Engine::default().with_machine("node1", "workers", "fedora-coreos"),
        Engine::failing(),
    ] {
        let app = Pipeline::builder(Arc::new(engine))
            .counter(Arc::new(RequestTally::new()))
            .build(Router::new());
        let out = serve(&app, request("/?uuid=node1")).await;
        assert_eq!(out.status(), StatusCode::OK);
        assert_eq!(out.body(), b"matchbox\n");
    }
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let app = Pipeline::builder(Arc::new(Engine::default()))
        .counter(Arc::new(RequestTally::new()))
        .build(Router::new());
    let out = serve(&app, request("/generic?uuid=node1")).await;
    assert_eq!(out.status(), StatusCode::NOT_FOUND);
}

// ── Composition ───────────────────────────────────────────────────────────────

#[test]
fn standard_stage_order() {
    let app = Pipeline::builder(Arc::new(Engine::default())).build(Router::new());
    assert_eq!(
        app.stage_names(),
        ["log-request", "count-request", "select-group", "select-profile"]
    );
}

#[tokio::test]
async fn custom_composition_runs_stages_in_order() {
    struct Trace(&'static str, Arc<Mutex<Vec<&'static str>>>);

    impl Middleware for Trace {
        fn name(&self) -> &'static str {
            self.0
        }

        fn handle<'a>(
            &'a self,
            req: Request,
            w: &'a mut dyn ResponseWriter,
            next: matchbox_http::Next<'a>,
        ) -> matchbox_http::BoxFuture<'a, ()> {
            Box::pin(async move {
                self.1.lock().unwrap().push(self.0);
                next.run(req, w).await;
                self.1.lock().unwrap().push(self.0);
            })
        }
    }

    let log = Arc::new(Mutex::new(Vec::new()));
    let tally = Arc::new(RequestTally::new());
    let stages: Vec<Arc<dyn Middleware>> = vec![
        Arc::new(RequestLogger),
        Arc::new(Trace("outer", log.clone())),
        Arc::new(CountRequests::new(tally.clone())),
        Arc::new(Trace("inner", log.clone())),
    ];
    let app = Pipeline::from_stages(stages, Arc::new(Router::new()));

    serve(&app, request("/")).await;

    assert_eq!(*log.lock().unwrap(), ["outer", "inner", "inner", "outer"]);
    assert_eq!(tally.get("/", StatusCode::OK), 1);
}
