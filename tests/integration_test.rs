use dblp_toc::fetch::{parse_delay, FetchArgs, KeyOrder};
use dblp_toc::links::LinksArgs;
use dblp_toc::Dataset;
use std::fs::{self, File};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_PATH: &str = "/search/publ/api";

fn fetch_args(server: &MockServer, start: i32, end: i32, out: &Path) -> FetchArgs {
    FetchArgs {
        venue: "sigmetrics".to_string(),
        start,
        end: Some(end),
        delay: 0.0,
        timeout: 5,
        retries: 0,
        out: Some(out.to_path_buf()),
        api_base: format!("{}{}", server.uri(), API_PATH),
        max_hits: 1000,
        min_pages: 5,
        page_filter_end_year: 2016,
        keep_nonconf: false,
        key_order: KeyOrder::FourDigitFirst,
    }
}

async fn mount_toc(server: &MockServer, toc_key: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("q", format!("toc:{toc_key}:").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_empty_fallback(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "result": { "hits": { "@total": "0" } }
        })))
        .mount(server)
        .await;
}

fn year_2000_body() -> serde_json::Value {
    serde_json::json!({
        "result": { "hits": { "hit": [
            { "info": {
                "title": "A Short Abstract.",
                "type": "Conference and Workshop Papers",
                "year": "2000",
                "pages": "1-3",
                "authors": { "author": { "text": "Poster Person", "@pid": "11/111" } }
            }},
            { "info": {
                "title": "A Full Paper.",
                "type": "Conference and Workshop Papers",
                "year": "2000",
                "pages": "10-20",
                "authors": { "author": { "text": "Paper Person", "@pid": "22/222" } }
            }}
        ]}}
    })
}

#[tokio::test]
async fn test_fetch_end_to_end_filters_short_entries() {
    let temp_dir = TempDir::new().unwrap();
    let out = temp_dir.path().join("data/sigmetrics.json");
    let mock_server = MockServer::start().await;

    mount_toc(&mock_server, "db/conf/sigmetrics/sigmetrics2000.bht", year_2000_body()).await;

    let dataset = dblp_toc::fetch::run_async(fetch_args(&mock_server, 2000, 2000, &out))
        .await
        .unwrap();

    assert_eq!(dataset.records.len(), 1);
    assert_eq!(dataset.records[0].title, "A Full Paper.");
    assert_eq!(dataset.authors.len(), 1);
    assert_eq!(dataset.authors[0].id, "pid:22/222");
    assert_eq!(dataset.authors[0].pubs, 1);
    assert_eq!(dataset.notes.skipped_by_page_length, 1);
    assert_eq!(dataset.notes.skipped_non_conf_or_editorship, 0);
    assert_eq!(dataset.notes.years_with_no_hits, 0);
    assert_eq!(
        dataset.notes.toc_keys.get(&2000).map(String::as_str),
        Some("db/conf/sigmetrics/sigmetrics2000.bht")
    );

    assert!(out.exists());
    let written: Dataset = serde_json::from_reader(File::open(&out).unwrap()).unwrap();
    assert_eq!(written, dataset);

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert!(raw["fetchedAt"].is_u64());
    assert_eq!(raw["filters"]["pageFilterEndYear"], 2016);
    assert_eq!(raw["authorMeta"]["pid:22/222"]["canonicalName"], "Paper Person");
    assert_eq!(raw["authors"][0]["firstAuth"], 1);
    assert_eq!(raw["records"][0]["authorIds"][0], "pid:22/222");
    assert_eq!(raw["records"][0]["type"], "Conference and Workshop Papers");
}

#[tokio::test]
async fn test_fetch_counts_years_without_hits() {
    let temp_dir = TempDir::new().unwrap();
    let out = temp_dir.path().join("out.json");
    let mock_server = MockServer::start().await;

    mount_toc(&mock_server, "db/conf/sigmetrics/sigmetrics00.bht", year_2000_body()).await;
    mount_empty_fallback(&mock_server).await;

    let dataset = dblp_toc::fetch::run_async(fetch_args(&mock_server, 1999, 2001, &out))
        .await
        .unwrap();

    assert_eq!(dataset.notes.years_with_no_hits, 2);
    assert_eq!(dataset.records.len(), 1);
    assert_eq!(
        dataset.notes.toc_keys.get(&2000).map(String::as_str),
        Some("db/conf/sigmetrics/sigmetrics00.bht")
    );
    assert_eq!(dataset.start_year, 1999);
    assert_eq!(dataset.end_year, 2001);
}

#[tokio::test]
async fn test_fetch_is_idempotent_for_identical_responses() {
    let temp_dir = TempDir::new().unwrap();
    let mock_server = MockServer::start().await;

    mount_toc(
        &mock_server,
        "db/conf/sigmetrics/sigmetrics2001.bht",
        serde_json::json!({
            "result": { "hits": { "hit": [
                { "info": { "title": "One", "pages": "1-12", "authors": { "author": [
                    { "text": "Ann Lee", "@pid": "1" }, "Ben Ng", { "text": "Cy Ho", "@pid": "3" }
                ]}}},
                { "info": { "title": "Two", "pages": "5-20", "authors": { "author": [
                    "Ben Ng", { "text": "A. Lee", "@pid": "1" }
                ]}}}
            ]}}
        }),
    )
    .await;
    mount_toc(&mock_server, "db/conf/sigmetrics/sigmetrics2000.bht", year_2000_body()).await;

    let first = dblp_toc::fetch::run_async(fetch_args(
        &mock_server,
        2000,
        2001,
        &temp_dir.path().join("first.json"),
    ))
    .await
    .unwrap();
    let second = dblp_toc::fetch::run_async(fetch_args(
        &mock_server,
        2000,
        2001,
        &temp_dir.path().join("second.json"),
    ))
    .await
    .unwrap();

    assert_eq!(
        serde_json::to_string(&first.records).unwrap(),
        serde_json::to_string(&second.records).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&first.authors).unwrap(),
        serde_json::to_string(&second.authors).unwrap()
    );
    assert_eq!(first.author_meta, second.author_meta);

    let ann = first.authors.iter().find(|a| a.id == "pid:1").unwrap();
    assert_eq!(ann.pubs, 2);
    assert_eq!(ann.first_auth, 1);
    assert_eq!(ann.last_auth, 1);
    assert_eq!(ann.name, "A. Lee");
    assert_eq!(ann.aliases, vec!["A. Lee", "Ann Lee"]);
}

#[tokio::test]
async fn test_fetch_then_links() {
    let temp_dir = TempDir::new().unwrap();
    let dataset_path = temp_dir.path().join("sigmetrics.json");
    let links_path = temp_dir.path().join("author_links.json");
    let csr_dir = temp_dir.path().join("csrankings");
    fs::create_dir_all(&csr_dir).unwrap();

    let mock_server = MockServer::start().await;
    mount_toc(
        &mock_server,
        "db/conf/sigmetrics/sigmetrics2020.bht",
        serde_json::json!({
            "result": { "hits": { "hit": [
                { "info": { "title": "Modern.", "pages": "1-2", "authors": { "author": [
                    { "text": "José García 0001", "@pid": "9/9" }, "Ben Ng"
                ]}}}
            ]}}
        }),
    )
    .await;

    let dataset = dblp_toc::fetch::run_async(fetch_args(&mock_server, 2020, 2020, &dataset_path))
        .await
        .unwrap();
    // 2020 is past the page-filter cutoff, so the 2-page entry stays.
    assert_eq!(dataset.records.len(), 1);

    fs::write(
        csr_dir.join("csrankings-g.csv"),
        "name,affiliation,homepage,scholarid\nJose Garcia,Uni,https://jg.example,jg1\n",
    )
    .unwrap();
    fs::write(
        csr_dir.join("csrankings-n.csv"),
        "name,affiliation,homepage,scholarid\nBen Ng,Uni,https://ben.example,NOSCHOLARPAGE\n",
    )
    .unwrap();

    let links = dblp_toc::links::run_async(LinksArgs {
        dataset: dataset_path,
        csrankings: csr_dir.to_string_lossy().into_owned(),
        output: links_path.clone(),
        timeout: 5,
    })
    .await
    .unwrap();

    assert_eq!(links.stats.authors, 2);
    assert_eq!(links.stats.authors_with_pid, 1);
    assert_eq!(links.stats.authors_matched_in_csrankings, 2);

    let garcia = &links.by_pid["9/9"];
    assert_eq!(garcia.dblp.as_deref(), Some("https://dblp.org/pid/9/9.html"));
    assert_eq!(garcia.homepage.as_deref(), Some("https://jg.example"));
    assert_eq!(
        garcia.google_scholar.as_deref(),
        Some("https://scholar.google.com/citations?user=jg1&hl=en")
    );

    let ng = &links.by_name["Ben Ng"];
    assert_eq!(ng.homepage.as_deref(), Some("https://ben.example"));
    assert!(ng.google_scholar.is_none());

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&links_path).unwrap()).unwrap();
    assert_eq!(raw["byPid"]["9/9"]["googleScholar"], "https://scholar.google.com/citations?user=jg1&hl=en");
    assert!(raw["byName"]["Ben Ng"].get("dblp").is_none());
}

#[test]
fn test_delay_must_be_finite_and_non_negative() {
    assert_eq!(parse_delay("0.6"), Ok(0.6));
    assert_eq!(parse_delay("0"), Ok(0.0));
    assert!(parse_delay("inf").is_err());
    assert!(parse_delay("NaN").is_err());
    assert!(parse_delay("-1").is_err());
    assert!(parse_delay("soon").is_err());
}

#[tokio::test]
async fn test_fetch_rejects_infinite_delay_without_writing() {
    let temp_dir = TempDir::new().unwrap();
    let out = temp_dir.path().join("out.json");
    let mock_server = MockServer::start().await;

    let mut args = fetch_args(&mock_server, 2000, 2000, &out);
    args.delay = f64::INFINITY;

    assert!(dblp_toc::fetch::run_async(args).await.is_err());
    assert!(!out.exists());
}
