use axum::http::StatusCode;
use base64::Engine;
use chrono::NaiveDate;
use choreboard_server::photos::FsPhotoStore;
use choreboard_server::{server, storage};
use choreboard_shared::api::endpoints as ep;
use choreboard_shared::domain::{ChoreTemplate, Frequency};
use reqwest::Client;
use serde_json::{Value, json};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

struct TestServer {
    base: String,
    client: Client,
    handle: tokio::task::JoinHandle<()>,
    _tempdir: tempfile::TempDir,
}

impl TestServer {
    async fn spawn() -> Option<Self> {
        let dir = tempfile::tempdir().unwrap();
        let (addr, handle) = match start_server(dir.path()).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                eprintln!("Skipping test due to sandbox restrictions: {e}");
                return None;
            }
            Err(e) => panic!("failed to start server: {e}"),
        };
        Some(Self {
            base: format!("http://{}", addr),
            client: Client::new(),
            handle,
            _tempdir: dir,
        })
    }

    async fn request(&self, method: &str, url: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = match method {
            "GET" => self.client.get(url),
            "POST" => self.client.post(url),
            "PUT" => self.client.put(url),
            "DELETE" => self.client.delete(url),
            other => panic!("unsupported method {other}"),
        };
        if let Some(b) = body {
            req = req.json(&b);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status();
        let text = resp.text().await.unwrap();
        let val = if text.is_empty() {
            json!(null)
        } else {
            serde_json::from_str(&text).unwrap_or(json!({"raw": text}))
        };
        (status, val)
    }

    async fn request_expect(
        &self,
        method: &str,
        url: &str,
        body: Option<Value>,
        expected: StatusCode,
    ) -> Value {
        let (status, value) = self.request(method, url, body).await;
        assert_eq!(
            status, expected,
            "{method} {url} returned {status:?} with body {value:?}",
        );
        value
    }

    async fn id_of(&self, url: &str, key: &str, value: &str) -> i64 {
        let list = self
            .request_expect("GET", url, None, StatusCode::OK)
            .await;
        list.as_array()
            .unwrap()
            .iter()
            .find(|v| v.get(key).and_then(|s| s.as_str()) == Some(value))
            .and_then(|v| v.get("id"))
            .and_then(|v| v.as_i64())
            .unwrap_or_else(|| panic!("{value} not found in {url}"))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn start_server(
    dir: &Path,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), std::io::Error> {
    let config = server::AppConfig {
        people: vec!["Alice".into(), "Bob".into()],
        chores: vec![
            ChoreTemplate {
                room: "Kitchen".into(),
                task: "Sweep".into(),
                frequency: Frequency::Daily,
                estimated_time: 10,
            },
            ChoreTemplate {
                room: "Bath".into(),
                task: "Scrub tub".into(),
                frequency: Frequency::Weekly,
                estimated_time: 20,
            },
        ],
        photo_dir: Some(dir.join("photos")),
        dev_cors_origin: None,
        listen_port: None,
        max_upload_bytes: None,
    };

    let store = storage::Store::connect_sqlite(dir.join("test.db").to_str().unwrap())
        .await
        .expect("db");
    store
        .seed(&config.people, &config.chores)
        .await
        .expect("seed");

    let photos = Arc::new(FsPhotoStore::new(dir.join("photos")));
    let state = server::AppState::new(config, store, photos);
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Ok((addr, handle))
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

#[tokio::test]
async fn public_endpoints_work() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let url = format!("{}/healthz", server.base);
    let resp = server.client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get("x-request-id").is_some());

    let version = server
        .request_expect("GET", &ep::version(&server.base), None, StatusCode::OK)
        .await;
    assert!(version.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn seeded_people_and_chores_are_listed_sorted() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let people = server
        .request_expect("GET", &ep::people(&server.base), None, StatusCode::OK)
        .await;
    let names: Vec<_> = people
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["Alice", "Bob"]);

    let chores = server
        .request_expect("GET", &ep::chores(&server.base), None, StatusCode::OK)
        .await;
    let chores = chores.as_array().unwrap();
    assert_eq!(chores[0]["room"], "Bath");
    assert_eq!(chores[0]["frequency"], "Weekly");
    assert_eq!(chores[1]["task"], "Sweep");
}

#[tokio::test]
async fn assign_complete_and_report() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let base = server.base.clone();
    let alice = server.id_of(&ep::people(&base), "name", "Alice").await;
    let bob = server.id_of(&ep::people(&base), "name", "Bob").await;
    let sweep = server.id_of(&ep::chores(&base), "task", "Sweep").await as i32;

    server
        .request_expect(
            "PUT",
            &ep::day_chore(&base, day(1), sweep),
            Some(json!({"person_id": bob})),
            StatusCode::OK,
        )
        .await;
    let assigned = server
        .request_expect(
            "PUT",
            &ep::day_chore(&base, day(1), sweep),
            Some(json!({"person_id": alice})),
            StatusCode::OK,
        )
        .await;
    let assignment_id = assigned["id"].as_i64().unwrap() as i32;

    let board = server
        .request_expect(
            "GET",
            &ep::day_assignments(&base, day(1)),
            None,
            StatusCode::OK,
        )
        .await;
    let rows = board["assignments"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["task"], "Sweep");
    assert_eq!(rows[0]["assigned_to"], "Alice");
    assert_eq!(rows[0]["is_completed"], false);
    assert_eq!(board["progress"]["completed"], 0);

    let photo = base64::engine::general_purpose::STANDARD.encode(b"fake-jpeg");
    let done = server
        .request_expect(
            "POST",
            &ep::assignment_complete(&base, assignment_id),
            Some(json!({
                "actual_minutes": 12,
                "photo": {"filename": "floor.jpg", "data_base64": photo}
            })),
            StatusCode::CREATED,
        )
        .await;
    let photo_id = done["photo_filename"].as_str().unwrap().to_string();
    assert!(photo_id.ends_with("_floor.jpg"));

    // Second completion of the same assignment is refused
    server
        .request_expect(
            "POST",
            &ep::assignment_complete(&base, assignment_id),
            Some(json!({"actual_minutes": 5})),
            StatusCode::CONFLICT,
        )
        .await;

    let board = server
        .request_expect(
            "GET",
            &ep::day_assignments(&base, day(1)),
            None,
            StatusCode::OK,
        )
        .await;
    let row = &board["assignments"][0];
    assert_eq!(row["is_completed"], true);
    assert_eq!(row["actual_minutes"], 12);
    assert_eq!(board["progress"]["completed"], 1);

    let resp = server
        .client
        .get(ep::photo(&base, &photo_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("content-type").unwrap().to_str().unwrap(),
        "image/jpeg"
    );
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"fake-jpeg");

    let report = server
        .request_expect(
            "GET",
            &ep::report(&base, day(1), day(7)),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(report["summary"]["total"], 1);
    assert_eq!(report["summary"]["completed"], 1);
    assert_eq!(report["summary"]["completion_rate"], 100.0);
    assert_eq!(report["rows"][0]["status"], "Complete");

    let resp = server
        .client
        .get(ep::report_csv(&base, day(1), day(7)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(
        resp.headers()
            .get("content-disposition")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("chore_assignments_2024-01-01_to_2024-01-07.csv")
    );
    let csv = resp.text().await.unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "assigned_date,room,task,assigned_to,estimated_time,status,actual_minutes"
    );
    assert_eq!(
        lines.next().unwrap(),
        "2024-01-01,Kitchen,Sweep,Alice,10,Complete,12"
    );
}

#[tokio::test]
async fn phone_sized_photo_is_accepted() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let base = server.base.clone();
    let alice = server.id_of(&ep::people(&base), "name", "Alice").await;
    let tub = server.id_of(&ep::chores(&base), "task", "Scrub tub").await as i32;
    let assigned = server
        .request_expect(
            "PUT",
            &ep::day_chore(&base, day(10), tub),
            Some(json!({"person_id": alice})),
            StatusCode::OK,
        )
        .await;
    let assignment_id = assigned["id"].as_i64().unwrap() as i32;

    // 4 MiB before base64, well past axum's 2 MiB default body limit
    let photo: Vec<u8> = (0..4 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let encoded = base64::engine::general_purpose::STANDARD.encode(&photo);
    let done = server
        .request_expect(
            "POST",
            &ep::assignment_complete(&base, assignment_id),
            Some(json!({
                "actual_minutes": 20,
                "photo": {"filename": "IMG_0042.jpg", "data_base64": encoded}
            })),
            StatusCode::CREATED,
        )
        .await;
    let photo_id = done["photo_filename"].as_str().unwrap().to_string();

    let resp = server
        .client
        .get(ep::photo(&base, &photo_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.bytes().await.unwrap().len(), photo.len());
}

#[tokio::test]
async fn copy_without_body_uses_previous_day() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let base = server.base.clone();
    let alice = server.id_of(&ep::people(&base), "name", "Alice").await;
    let sweep = server.id_of(&ep::chores(&base), "task", "Sweep").await as i32;
    server
        .request_expect(
            "PUT",
            &ep::day_chore(&base, day(14), sweep),
            Some(json!({"person_id": alice})),
            StatusCode::OK,
        )
        .await;

    let copied = server
        .request_expect("POST", &ep::day_copy(&base, day(15)), None, StatusCode::OK)
        .await;
    assert_eq!(copied["from_date"], "2024-01-14");
    assert_eq!(copied["copied"], 1);
}

#[tokio::test]
async fn copy_clear_and_delete() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let base = server.base.clone();
    let alice = server.id_of(&ep::people(&base), "name", "Alice").await;
    let sweep = server.id_of(&ep::chores(&base), "task", "Sweep").await as i32;
    let tub = server.id_of(&ep::chores(&base), "task", "Scrub tub").await as i32;

    for chore in [sweep, tub] {
        server
            .request_expect(
                "PUT",
                &ep::day_chore(&base, day(1), chore),
                Some(json!({"person_id": alice})),
                StatusCode::OK,
            )
            .await;
    }
    server
        .request_expect(
            "PUT",
            &ep::day_chore(&base, day(2), sweep),
            Some(json!({"person_id": alice})),
            StatusCode::OK,
        )
        .await;

    // Without from_date the previous day is copied
    let copied = server
        .request_expect(
            "POST",
            &ep::day_copy(&base, day(2)),
            Some(json!({})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(copied["copied"], 2);
    assert_eq!(copied["from_date"], "2024-01-01");

    let board = server
        .request_expect(
            "GET",
            &ep::day_assignments(&base, day(2)),
            None,
            StatusCode::OK,
        )
        .await;
    let rows = board["assignments"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    let first_id = rows[0]["assignment_id"].as_i64().unwrap() as i32;

    server
        .request_expect(
            "DELETE",
            &ep::assignment(&base, first_id),
            None,
            StatusCode::NO_CONTENT,
        )
        .await;
    server
        .request_expect(
            "DELETE",
            &ep::assignment(&base, first_id),
            None,
            StatusCode::NOT_FOUND,
        )
        .await;

    let cleared = server
        .request_expect(
            "DELETE",
            &ep::day_assignments(&base, day(1)),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(cleared["deleted"], 2);

    // Copying an empty day still wipes the target
    let copied = server
        .request_expect(
            "POST",
            &ep::day_copy(&base, day(2)),
            Some(json!({"from_date": "2024-01-01"})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(copied["copied"], 0);
    let board = server
        .request_expect(
            "GET",
            &ep::day_assignments(&base, day(2)),
            None,
            StatusCode::OK,
        )
        .await;
    assert!(board["assignments"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn invalid_input_is_rejected() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let base = server.base.clone();
    server
        .request_expect(
            "POST",
            &ep::people(&base),
            Some(json!({"name": "  "})),
            StatusCode::BAD_REQUEST,
        )
        .await;
    server
        .request_expect(
            "POST",
            &ep::chores(&base),
            Some(json!({"room": "Hall", "task": "Dust", "frequency": "Weekly", "estimated_time": 0})),
            StatusCode::BAD_REQUEST,
        )
        .await;
    let created = server
        .request_expect(
            "POST",
            &ep::chores(&base),
            Some(json!({"room": "Yard", "task": "Mow", "frequency": "Summer-weekly", "estimated_time": 45})),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(created["frequency"], "Summer-weekly");

    let alice = server.id_of(&ep::people(&base), "name", "Alice").await;
    server
        .request_expect(
            "PUT",
            &ep::day_chore(&base, day(3), 9999),
            Some(json!({"person_id": alice})),
            StatusCode::NOT_FOUND,
        )
        .await;

    let sweep = server.id_of(&ep::chores(&base), "task", "Sweep").await as i32;
    let asg = server
        .request_expect(
            "PUT",
            &ep::day_chore(&base, day(3), sweep),
            Some(json!({"person_id": alice})),
            StatusCode::OK,
        )
        .await;
    let asg_id = asg["id"].as_i64().unwrap() as i32;
    server
        .request_expect(
            "POST",
            &ep::assignment_complete(&base, asg_id),
            Some(json!({"actual_minutes": 0})),
            StatusCode::BAD_REQUEST,
        )
        .await;
    server
        .request_expect(
            "POST",
            &ep::assignment_complete(&base, asg_id),
            Some(json!({"actual_minutes": 3, "photo": {"filename": "x.jpg", "data_base64": "!!"}})),
            StatusCode::BAD_REQUEST,
        )
        .await;
    server
        .request_expect(
            "GET",
            &ep::photo(&base, "missing.jpg"),
            None,
            StatusCode::NOT_FOUND,
        )
        .await;

    let empty = server
        .request_expect(
            "GET",
            &ep::report(&base, day(20), day(21)),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(empty["summary"]["total"], 0);
    assert_eq!(empty["summary"]["completion_rate"], 0.0);
}
