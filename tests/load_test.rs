//! Load testing through both legs.

use std::time::{Duration, Instant};

mod common;

use common::Harness;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients() {
    let mut harness = Harness::start().await;
    let proxy_addr = harness.proxy.incoming_addr();

    let concurrency = 20;
    let requests_per_task = 25;
    let total_requests = concurrency * requests_per_task;

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let start = Instant::now();

    let mut handles = Vec::with_capacity(concurrency);
    for task in 0..concurrency {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let mut ok = 0;
            for i in 0..requests_per_task {
                let res = client
                    .get(format!("http://{proxy_addr}/load/{task}/{i}"))
                    .header("X-Client", format!("{task}-{i}"))
                    .send()
                    .await;
                if let Ok(res) = res {
                    if res.status() == 200 && res.text().await.unwrap_or_default() == "hello" {
                        ok += 1;
                    }
                }
            }
            ok
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        succeeded += handle.await.unwrap();
    }
    let elapsed = start.elapsed();
    println!(
        "{total_requests} requests in {elapsed:?} ({:.0} req/s)",
        total_requests as f64 / elapsed.as_secs_f64()
    );

    assert_eq!(succeeded, total_requests);

    // every withheld header arrived with its own request
    tokio::time::sleep(Duration::from_millis(50)).await;
    let seen = harness.origin.drain();
    assert_eq!(seen.len(), total_requests);
    for request in &seen {
        let text = common::text(request);
        let path = text.split(' ').nth(1).unwrap();
        let parts: Vec<&str> = path.trim_start_matches("/load/").split('/').collect();
        assert!(
            text.contains(&format!("x-client: {}-{}", parts[0], parts[1])),
            "withheld header mismatched in {text}"
        );
        assert!(!text.to_ascii_lowercase().contains("x-message-id"));
    }

    assert!(harness.proxy.sessions().is_empty());
    harness.proxy.shutdown().await;
}
