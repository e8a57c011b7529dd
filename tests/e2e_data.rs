//! E2E tests for dataset and stats endpoints

mod common;

use common::{SUBJECT, TestServer, sample_snapshot};
use coolfollowers::data::{Dataset, SnapshotCache};
use serde_json::{Value, json};

async fn get(server: &TestServer, path: &str) -> reqwest::Response {
    server.client.get(server.url(path)).send().await.unwrap()
}

#[tokio::test]
async fn test_datasets_are_404_before_first_refresh() {
    let server = TestServer::new().await;

    for path in [
        "/api/data/profile",
        "/api/data/posts",
        "/api/data/followers",
        "/api/data/following",
    ] {
        let response = get(&server, path).await;
        assert_eq!(response.status(), 404, "{path}");
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().unwrap().contains("Trigger a refresh"));
    }
}

#[tokio::test]
async fn test_datasets_after_refresh() {
    let server = TestServer::new().await;
    server.refresh_with(sample_snapshot()).await;

    let profile: Value = get(&server, "/api/data/profile").await.json().await.unwrap();
    assert_eq!(profile["username"], SUBJECT);
    assert_eq!(profile["followersCount"], 1000);
    assert_eq!(profile["biography"], "Building things #maker");

    let posts: Value = get(&server, "/api/data/posts").await.json().await.unwrap();
    let posts = posts.as_array().unwrap();
    assert_eq!(posts.len(), 3);
    assert_eq!(posts[0]["hashtags"], json!(["woodwork", "maker"]));
    assert_eq!(posts[1]["media"]["kind"], "video");
    assert_eq!(posts[2]["media"]["kind"], "carousel");
    assert_eq!(posts[2]["media"]["items"].as_array().unwrap().len(), 2);

    let followers: Value = get(&server, "/api/data/followers").await.json().await.unwrap();
    assert_eq!(followers[0]["isVerified"], true);
    assert_eq!(followers[1]["isVerified"], false);

    let following: Value = get(&server, "/api/data/following").await.json().await.unwrap();
    assert_eq!(following[0]["isPrivate"], true);
}

async fn store_raw(server: &TestServer, dataset: Dataset, payload: Value) {
    let cache: &SnapshotCache = &server.state.cache;
    cache.put(dataset, &payload, None).await.unwrap();
}

#[tokio::test]
async fn test_invalid_profile_returns_raw_data() {
    let server = TestServer::new().await;
    store_raw(&server, Dataset::Profile, json!({"username": SUBJECT})).await;

    let response = get(&server, "/api/data/profile").await;
    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["username"], SUBJECT);
}

#[tokio::test]
async fn test_invalid_list_is_flagged() {
    let server = TestServer::new().await;
    let raw = json!([{"id": "1", "likeCount": "many"}]);
    store_raw(&server, Dataset::Posts, raw.clone()).await;

    let response = get(&server, "/api/data/posts").await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-validation-failed"], "true");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, raw);
}

#[tokio::test]
async fn test_stats_on_empty_cache() {
    let server = TestServer::new().await;

    let response = get(&server, "/api/data/stats").await;
    assert_eq!(response.status(), 200);
    let stats: Value = response.json().await.unwrap();

    assert_eq!(stats["profile"], Value::Null);
    assert_eq!(stats["aggregate"]["totalPosts"], 0);
    assert_eq!(stats["aggregate"]["medianLikes"], 0);
    assert_eq!(stats["timing"]["bestDay"], Value::Null);
    assert_eq!(stats["timing"]["bestHour"], Value::Null);
    assert_eq!(stats["cache"]["isStale"], true);
    assert_eq!(stats["cache"]["lastRefresh"], Value::Null);
}

#[tokio::test]
async fn test_stats_after_refresh() {
    let server = TestServer::new().await;
    server.refresh_with(sample_snapshot()).await;

    let stats: Value = get(&server, "/api/data/stats").await.json().await.unwrap();

    assert_eq!(stats["profile"]["followersCount"], 1000);
    assert_eq!(stats["profile"]["postsCount"], 3);

    let aggregate = &stats["aggregate"];
    assert_eq!(aggregate["totalPosts"], 3);
    assert_eq!(aggregate["totalLikes"], 180);
    assert_eq!(aggregate["totalComments"], 15);
    assert_eq!(aggregate["avgLikes"], 60);
    assert_eq!(aggregate["avgComments"], 5);
    assert_eq!(aggregate["medianLikes"], 50);

    let engagement = &stats["engagement"];
    assert_eq!(engagement["totalVideoViews"], 5000);
    // (180 + 15) / 3 / 1000 * 100
    assert_eq!(engagement["engagementRate"], 6.5);
    assert_eq!(engagement["content"]["imagePosts"], 1);
    assert_eq!(engagement["content"]["videoPosts"], 1);
    assert_eq!(engagement["content"]["carouselPosts"], 1);

    assert_eq!(stats["hashtags"][0]["tag"], "woodwork");
    assert_eq!(stats["hashtags"][0]["count"], 2);
    assert_eq!(stats["hashtags"][0]["avgLikes"], 75);

    // 2024-05-05 and 2024-05-19 are both Sundays, at 18:xx UTC
    assert_eq!(stats["timing"]["bestDay"], "Sunday");
    assert_eq!(stats["timing"]["bestHour"], 18);

    assert_eq!(stats["months"]["2024-05"]["count"], 2);
    assert_eq!(stats["months"]["2024-05"]["postIds"], json!(["1", "3"]));
    assert_eq!(stats["months"]["2024-04"]["count"], 1);

    assert_eq!(stats["topPosts"]["byLikes"][0]["id"], "1");
    assert_eq!(stats["topPosts"]["byComments"][2]["id"], "3");

    assert_eq!(stats["cache"]["isStale"], false);
    assert_eq!(stats["cache"]["lastRefresh"], "2024-06-01T12:00:00Z");
}

#[tokio::test]
async fn test_datasets_survive_on_sqlite() {
    let server = TestServer::with_sqlite().await;
    server.refresh_with(sample_snapshot()).await;

    let posts: Value = get(&server, "/api/data/posts").await.json().await.unwrap();
    assert_eq!(posts.as_array().unwrap().len(), 3);

    // past the dataset TTL every record is gone
    server.advance(86_400);
    assert_eq!(get(&server, "/api/data/posts").await.status(), 404);
}
