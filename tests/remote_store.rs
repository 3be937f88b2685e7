// Vote server + HTTP client round trip on an ephemeral port
#![cfg(feature = "server")]

use std::sync::Arc;

use cookie_vote::server::{router, AppState};
use cookie_vote::{
    Category, Competitor, ControllerState, CounterName, CounterStore, HttpCounterStore,
    HttpSessionService, MemoryFlagStore, SqliteCounterStore, StoreError, SubmissionGuard,
    VoteController,
};

async fn spawn_server(competitors: &[Competitor]) -> String {
    let store = SqliteCounterStore::open_in_memory().unwrap();
    store.seed(competitors).unwrap();

    let app = router(AppState {
        store: Arc::new(store),
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn create_test_competitors() -> Vec<Competitor> {
    vec![
        Competitor::new("a", "Chocolate Chip", "https://img/a.png").with_votes(3, 1),
        Competitor::new("b", "Oatmeal Raisin", "https://img/b.png"),
        Competitor::new("c", "Snickerdoodle", "https://img/c.png").with_votes(5, 2),
    ]
}

#[tokio::test]
async fn test_http_store_reads_and_writes() {
    let base_url = spawn_server(&create_test_competitors()).await;
    let store = HttpCounterStore::new(base_url);

    assert_eq!(store.list_all().await.unwrap(), create_test_competitors());

    store.increment("b", CounterName::LooksVotes, 1).await.unwrap();
    let err = store
        .increment("nobody", CounterName::LooksVotes, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == "nobody"));

    let competitors = store.list_all().await.unwrap();
    assert_eq!(competitors[1].looks_votes, 1);
}

#[tokio::test]
async fn test_controller_votes_through_server() {
    let base_url = spawn_server(&create_test_competitors()).await;
    let mut controller = VoteController::new(
        Arc::new(HttpCounterStore::new(base_url.clone())),
        Arc::new(HttpSessionService::new(base_url)),
        SubmissionGuard::new(MemoryFlagStore::default()),
    );

    assert_eq!(controller.initialize().await.unwrap(), ControllerState::Voting);
    for id in ["a", "c"] {
        controller.toggle_selection(id, Category::Flavor).unwrap();
    }
    for id in ["b", "c"] {
        controller.toggle_selection(id, Category::Looks).unwrap();
    }

    let receipt = controller.submit_votes().await.unwrap();

    assert!(receipt.refreshed);
    assert_eq!(controller.state(), ControllerState::Submitted);
    let c = controller.competitor("c").unwrap();
    assert_eq!((c.flavor_votes, c.looks_votes), (6, 3));
}
