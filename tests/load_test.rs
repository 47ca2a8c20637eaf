//! Load testing for the companion host.

use std::collections::HashSet;
use std::time::{Duration, Instant};

mod common;
use common::Harness;

#[tokio::test]
async fn test_concurrent_requests_get_unique_ids() {
    let h = Harness::new();
    let running = h.start(h.bootstrap()).await;

    let concurrency = 20;
    let requests_per_task = 25;
    let total_requests = concurrency * requests_per_task;

    let client = reqwest::Client::new();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = running.url("/up");
        let secret = running.secret.clone();
        tasks.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            let mut latencies = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                let res = client
                    .get(&url)
                    .header("x-companion-token", &secret)
                    .send()
                    .await
                    .unwrap();
                assert!(res.status().is_success());
                let id: u64 = res.headers()["x-request-id"].to_str().unwrap().parse().unwrap();
                ids.push(id);
                latencies.push(req_start.elapsed());
            }
            (ids, latencies)
        }));
    }

    let mut ids = HashSet::new();
    let mut latencies = Vec::new();
    for task in tasks {
        let (task_ids, task_latencies) = task.await.unwrap();
        ids.extend(task_ids);
        latencies.extend(task_latencies);
    }
    let elapsed = start.elapsed();

    assert_eq!(ids.len(), total_requests);
    latencies.sort();
    let p99 = latencies[latencies.len() * 99 / 100];
    println!(
        "{} requests in {:?} ({:.0} req/s), p99 {:?}",
        total_requests,
        elapsed,
        total_requests as f64 / elapsed.as_secs_f64(),
        p99
    );
    assert!(p99 < Duration::from_secs(2));

    h.stop(running).await;
}
