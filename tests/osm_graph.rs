//! Builds the whole object graph from a mock OSM server

use chrono::NaiveDate;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use osm_accessor::credential::LegacyCredential;
use osm_accessor::section::init_report::Severity;
use osm_accessor::traits::{FromMember, RecordView};
use osm_accessor::{Accessor, Cache, Credential, Member, ObjectTypes, Osm, OsmOptions, TermSelection};

async fn mount_json(server: &MockServer, url_path: &str, action: &str, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(url_path))
        .and(query_param("action", action))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn osm_server() -> MockServer {
    let server = MockServer::start().await;

    mount_json(&server, "/api.php", "getUserRoles", json!([
        {"sectionid": "15797", "sectionname": "Cubs", "section": "cubs", "groupname": "7th Lichfield", "isDefault": "1"},
        {"sectionid": "14324", "sectionname": "Scouts", "section": "scouts", "groupname": "7th Lichfield", "isDefault": "0"},
    ])).await;
    mount_json(&server, "/api.php", "getTerms", json!({
        "15797": [
            {"termid": "100", "name": "Spring", "startdate": "2023-01-01", "enddate": "2023-04-01"},
            {"termid": "101", "name": "Summer", "startdate": "2023-04-02", "enddate": "2023-07-01"},
        ],
        "14324": [
            {"termid": "200", "name": "Spring", "startdate": "2023-01-01", "enddate": "2023-04-01"},
            {"termid": "201", "name": "Summer", "startdate": "2023-04-02", "enddate": "2023-07-01"},
        ],
    })).await;
    mount_json(&server, "/ext/customdata/", "getStructure", json!({"data": [
        {"group_id": 1, "identifier": "contact_primary_1", "name": "Primary Contact 1", "columns": [
            {"column_id": 12, "varname": "email1", "label": "Email 1"},
            {"column_id": 13, "varname": "phone1", "label": "Phone 1"},
        ]},
    ]})).await;

    Mock::given(method("POST"))
        .and(path("/ext/members/contact/grid/"))
        .and(body_string_contains("section_id=15797"))
        .and(body_string_contains("term_id=101"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {
            "5": {"member_id": 5, "first_name": "Alex", "last_name": "Smith", "custom_data": {"1": {"12": "alex@example.com"}}},
            "6": {"member_id": 6, "first_name": "Sam", "last_name": "Jones", "custom_data": {"1": {"12": "sam@example.com", "13": "01543 000000"}}},
        }})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/ext/members/contact/grid/"))
        .and(body_string_contains("section_id=14324"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {
            "8": {"member_id": 8, "first_name": "Jo", "last_name": "Bloggs"},
        }})))
        .mount(&server)
        .await;

    mount_json(&server, "/ext/events/summary/", "get", json!({"items": [
        {"eventid": "77", "name": "Summer camp", "startdate": "2023-07-14", "starttime": "18:00:00", "enddate": "2023-07-16", "endtime": "15:00:00"},
    ]})).await;

    // The Scouts programme is broken
    Mock::given(method("POST"))
        .and(path("/programme.php"))
        .and(query_param("sectionid", "14324"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;
    mount_json(&server, "/programme.php", "getProgrammeSummary", json!({"items": [
        {"eveningid": "2", "title": "Pioneering", "meetingdate": "2023-05-15", "starttime": "19:00:00", "endtime": "20:30:00"},
        {"eveningid": "1", "title": "Fire lighting", "meetingdate": "2023-05-08", "starttime": "19:00:00", "endtime": "20:30:00"},
    ]})).await;

    server
}

fn accessor(server: &MockServer) -> Accessor {
    let credential = Credential::Legacy(LegacyCredential::new("1", "tok").with_user("2", "sec"));
    Accessor::new(&server.uri(), credential, Cache::in_memory()).unwrap()
}

fn options() -> OsmOptions {
    OsmOptions::default()
        .with_object_types(ObjectTypes::MEMBERS | ObjectTypes::EVENTS | ObjectTypes::PROGRAMME)
        .with_term(TermSelection::OnDate(NaiveDate::from_ymd_opt(2023, 5, 1).unwrap()))
}

#[tokio::test]
async fn whole_graph() {
    let _ = env_logger::builder().is_test(true).try_init();

    let server = osm_server().await;
    let accessor = accessor(&server);
    let osm: Osm = Osm::new(&accessor, options()).await.unwrap();

    assert_eq!(osm.sections().len(), 2);
    assert!(osm.inconsistent_terms().is_none());

    let cubs = osm.default_section().unwrap();
    assert_eq!(cubs.name(), "Cubs");
    assert_eq!(cubs.term().unwrap().name(), "Summer");
    assert!(cubs.report().is_success());

    let members = cubs.members().unwrap();
    assert_eq!(members.len(), 2);
    let alex = members.get("5").unwrap();
    assert_eq!(alex.get_str("contact_primary_1.email1").unwrap(), "alex@example.com");
    assert_eq!(alex.get_str("contact_primary_1.Phone 1").unwrap(), "");
    assert_eq!(members.get("6").unwrap().get_str("contact_primary_1.phone1").unwrap(), "01543 000000");
    assert!(alex.get("contact_primary_1.nonexistent").is_err());

    assert_eq!(cubs.events().unwrap()[0].name(), "Summer camp");
    let titles: Vec<&str> = cubs.programme().unwrap().meetings_by_date().iter().map(|m| m.title()).collect();
    assert_eq!(titles, vec!["Fire lighting", "Pioneering"]);

    // A broken programme does not prevent the rest of the section from loading
    let scouts = osm.section("14324").unwrap();
    assert!(scouts.programme().is_none());
    assert_eq!(scouts.members().unwrap().len(), 1);
    assert_eq!(scouts.events().unwrap().len(), 1);
    let issues = scouts.report().issues();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].severity, Severity::Warning);
    assert_eq!(issues[0].object, "programme");
}

/// A member type with its own helpers
struct Cub {
    member: Member,
}

impl FromMember for Cub {
    fn from_member(member: Member) -> Self {
        Cub { member }
    }

    fn member(&self) -> &Member {
        &self.member
    }
}

impl Cub {
    fn full_name(&self) -> String {
        format!("{} {}",
            self.member.get_str("first_name").unwrap_or_default(),
            self.member.get_str("last_name").unwrap_or_default())
    }

    fn email(&self) -> Option<String> {
        self.member.get_str("contact_primary_1.email1").ok().filter(|e| e.is_empty() == false)
    }
}

#[tokio::test]
async fn custom_member_type() {
    let server = osm_server().await;
    let accessor = accessor(&server);
    let osm: Osm<Cub> = Osm::new(&accessor, options().with_sections(&["15797"])).await.unwrap();

    let cubs = osm.section("15797").unwrap();
    let mut names: Vec<String> = cubs.members().unwrap().iter().map(|c| c.full_name()).collect();
    names.sort();
    assert_eq!(names, vec!["Alex Smith", "Sam Jones"]);
    assert_eq!(cubs.members().unwrap().get("6").unwrap().email().as_deref(), Some("sam@example.com"));
}
