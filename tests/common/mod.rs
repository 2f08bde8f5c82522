//! In-memory Redmine used by the integration tests.
//!
//! `FixtureTracker` implements `Transport` over a small fixture data set
//! (the usual eCookbook projects and issues) and answers in XML or JSON
//! depending on the requested path suffix, the way a real server does.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use quick_xml::events::Event;
use quick_xml::Reader;
use redmine_client::api::{ApiError, HttpMethod, HttpRequest, HttpResponse, Result, Transport};
use redmine_client::{Redmine, Settings, WireFormat};
use serde_json::{json, Value as Json};

pub const BASE_URI: &str = "http://localhost:3000";

pub const ALL_PROJECT_COUNT: usize = 6;

#[derive(Debug, Clone)]
struct FixtureProject {
    id: u64,
    name: &'static str,
    identifier: &'static str,
    parent_id: Option<u64>,
}

#[derive(Debug, Clone)]
struct FixtureJournal {
    id: u64,
    user_id: u64,
    notes: String,
}

#[derive(Debug, Clone)]
struct FixtureIssue {
    id: u64,
    project_id: u64,
    subject: String,
    description: String,
    author_id: u64,
    assigned_to_id: Option<u64>,
    parent_id: Option<u64>,
    start_date: Option<(i32, u32, u32)>,
    journals: Vec<FixtureJournal>,
}

#[derive(Debug)]
struct State {
    users: BTreeMap<u64, &'static str>,
    projects: Vec<FixtureProject>,
    issues: BTreeMap<u64, FixtureIssue>,
    next_issue_id: u64,
}

/// A fake Redmine server.
#[derive(Debug)]
pub struct FixtureTracker {
    state: RefCell<State>,
    requests: RefCell<Vec<HttpRequest>>,
    required_key: Option<String>,
}

impl FixtureTracker {
    pub fn new() -> Self {
        let users = BTreeMap::from([(1, "Redmine Admin"), (2, "John Smith"), (3, "Dave Lopper")]);

        let projects = vec![
            project(1, "eCookbook", "ecookbook", None),
            project(2, "OnlineStore", "onlinestore", None),
            project(3, "eCookbook Subproject 1", "subproject1", Some(1)),
            project(4, "eCookbook Subproject 2", "subproject2", Some(1)),
            project(5, "Private child of eCookbook", "private-child", Some(1)),
            project(6, "Child of private child", "project6", Some(5)),
        ];

        let issues = [
            FixtureIssue {
                id: 1,
                project_id: 1,
                subject: "Cannot print recipes".to_string(),
                description: "Unable to print recipes".to_string(),
                author_id: 2,
                assigned_to_id: None,
                parent_id: None,
                start_date: Some((2006, 7, 19)),
                journals: vec![
                    journal(1, 1, "Journal notes"),
                    journal(2, 2, "Some notes with Redmine links: #2, r2."),
                ],
            },
            FixtureIssue {
                id: 2,
                project_id: 1,
                subject: "Add ingredients categories".to_string(),
                description: "Ingredients of the recipe should be classified by categories"
                    .to_string(),
                author_id: 2,
                assigned_to_id: Some(3),
                parent_id: None,
                start_date: None,
                journals: vec![journal(3, 2, "A comment with inline image: !picture.jpg!")],
            },
            FixtureIssue {
                id: 3,
                project_id: 1,
                subject: "Error 281 when updating a recipe".to_string(),
                description: "Error 281 is encountered when saving a recipe".to_string(),
                author_id: 2,
                assigned_to_id: Some(2),
                parent_id: None,
                start_date: None,
                journals: Vec::new(),
            },
            FixtureIssue {
                id: 14,
                project_id: 2,
                subject: "Private issue on public project".to_string(),
                description: String::new(),
                author_id: 2,
                assigned_to_id: None,
                parent_id: Some(2),
                start_date: None,
                journals: Vec::new(),
            },
        ];

        Self {
            state: RefCell::new(State {
                users,
                projects,
                issues: issues.into_iter().map(|i| (i.id, i)).collect(),
                next_issue_id: 15,
            }),
            requests: RefCell::new(Vec::new()),
            required_key: None,
        }
    }

    /// Reject requests that do not carry `key` as their API key.
    pub fn requiring_key(mut self, key: &str) -> Self {
        self.required_key = Some(key.to_string());
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.borrow().last().cloned()
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn has_issue(&self, id: u64) -> bool {
        self.state.borrow().issues.contains_key(&id)
    }

    pub fn issue_subject(&self, id: u64) -> Option<String> {
        self.state.borrow().issues.get(&id).map(|i| i.subject.clone())
    }

    fn route(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let rest = request
            .url
            .strip_prefix(BASE_URI)
            .ok_or_else(|| ApiError::InvalidUrl(request.url.clone()))?;
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let (path, extension) = path
            .rsplit_once('.')
            .ok_or_else(|| ApiError::InvalidUrl(request.url.clone()))?;
        let format = match extension {
            "xml" => WireFormat::Xml,
            "json" => WireFormat::Json,
            _ => return Ok(HttpResponse::new(406, "")),
        };
        let query = parse_query(query);

        if let Some(required) = &self.required_key {
            if query.get("key") != Some(required) {
                return Ok(HttpResponse::new(401, ""));
            }
        }

        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let include_journals = query.get("include").map(String::as_str) == Some("journals");

        match (request.method, segments.as_slice()) {
            (HttpMethod::Get, ["issues"]) => {
                let state = self.state.borrow();
                let issues: Vec<&FixtureIssue> = state
                    .issues
                    .values()
                    .filter(|issue| matches_filters(issue, &query))
                    .collect();
                Ok(HttpResponse::new(200, state.render_issues(format, &issues)))
            }
            (HttpMethod::Get, ["issues", id]) => {
                let state = self.state.borrow();
                match id.parse().ok().and_then(|id: u64| state.issues.get(&id)) {
                    Some(issue) => Ok(HttpResponse::new(
                        200,
                        state.render_issue(format, issue, include_journals),
                    )),
                    None => Ok(HttpResponse::new(404, "")),
                }
            }
            (HttpMethod::Post, ["issues"]) => {
                let fields = parse_payload(format, "issue", request.body.as_deref())?;
                let mut state = self.state.borrow_mut();
                let (Some(subject), Some(project_id)) = (
                    fields.get("subject").cloned(),
                    fields.get("project_id").and_then(|v| v.parse().ok()),
                ) else {
                    return Ok(HttpResponse::new(422, state.render_errors(format)));
                };

                let id = state.next_issue_id;
                state.next_issue_id += 1;
                let mut issue = FixtureIssue {
                    id,
                    project_id,
                    subject,
                    description: String::new(),
                    author_id: 2,
                    assigned_to_id: None,
                    parent_id: None,
                    start_date: None,
                    journals: Vec::new(),
                };
                apply_fields(&mut issue, &fields);
                let body = state.render_issue(format, &issue, false);
                state.issues.insert(id, issue);
                Ok(HttpResponse::new(201, body))
            }
            (HttpMethod::Put, ["issues", id]) => {
                let fields = parse_payload(format, "issue", request.body.as_deref())?;
                let mut state = self.state.borrow_mut();
                match id.parse().ok().and_then(|id: u64| state.issues.get_mut(&id)) {
                    Some(issue) => {
                        apply_fields(issue, &fields);
                        Ok(HttpResponse::new(200, ""))
                    }
                    None => Ok(HttpResponse::new(404, "")),
                }
            }
            (HttpMethod::Delete, ["issues", id]) => {
                let mut state = self.state.borrow_mut();
                match id.parse().ok().and_then(|id: u64| state.issues.remove(&id)) {
                    Some(_) => Ok(HttpResponse::new(200, "")),
                    None => Ok(HttpResponse::new(404, "")),
                }
            }
            (HttpMethod::Get, ["projects"]) => {
                let state = self.state.borrow();
                Ok(HttpResponse::new(200, state.render_projects(format)))
            }
            (HttpMethod::Get, ["projects", id]) => {
                let state = self.state.borrow();
                let found = id
                    .parse()
                    .ok()
                    .and_then(|id: u64| state.projects.iter().find(|p| p.id == id));
                match found {
                    Some(project) => Ok(HttpResponse::new(200, state.render_project(format, project))),
                    None => Ok(HttpResponse::new(404, "")),
                }
            }
            _ => Ok(HttpResponse::new(404, "")),
        }
    }
}

impl Transport for FixtureTracker {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.borrow_mut().push(request.clone());
        self.route(request)
    }
}

/// A session against a fresh fixture tracker.
pub fn session(format: WireFormat) -> (Redmine, Rc<FixtureTracker>) {
    session_with(Settings::new(BASE_URI).with_format(format), FixtureTracker::new())
}

pub fn session_with(settings: Settings, tracker: FixtureTracker) -> (Redmine, Rc<FixtureTracker>) {
    let tracker = Rc::new(tracker);
    let redmine = Redmine::with_transport(&settings, tracker.clone());
    (redmine, tracker)
}

fn project(id: u64, name: &'static str, identifier: &'static str, parent_id: Option<u64>) -> FixtureProject {
    FixtureProject {
        id,
        name,
        identifier,
        parent_id,
    }
}

fn journal(id: u64, user_id: u64, notes: &str) -> FixtureJournal {
    FixtureJournal {
        id,
        user_id,
        notes: notes.to_string(),
    }
}

fn matches_filters(issue: &FixtureIssue, query: &BTreeMap<String, String>) -> bool {
    query.iter().all(|(field, value)| match field.as_str() {
        "project_id" => issue.project_id.to_string() == *value,
        "assigned_to_id" => issue.assigned_to_id.map(|id| id.to_string()).as_ref() == Some(value),
        "author_id" => issue.author_id.to_string() == *value,
        "parent_id" => issue.parent_id.map(|id| id.to_string()).as_ref() == Some(value),
        _ => true,
    })
}

fn apply_fields(issue: &mut FixtureIssue, fields: &BTreeMap<String, String>) {
    for (field, value) in fields {
        match field.as_str() {
            "subject" => issue.subject = value.clone(),
            "description" => issue.description = value.clone(),
            "project_id" => {
                if let Ok(id) = value.parse() {
                    issue.project_id = id;
                }
            }
            "assigned_to_id" => issue.assigned_to_id = value.parse().ok(),
            "parent_issue_id" => issue.parent_id = value.parse().ok(),
            _ => {}
        }
    }
}

fn parse_query(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| {
            let decode = |s: &str| {
                urlencoding::decode(s)
                    .map(|d| d.into_owned())
                    .unwrap_or_else(|_| s.to_string())
            };
            (decode(k), decode(v))
        })
        .collect()
}

/// Flat field map of a create/update payload.
fn parse_payload(format: WireFormat, object: &str, body: Option<&str>) -> Result<BTreeMap<String, String>> {
    let body = body.ok_or_else(|| ApiError::InvalidResponse("missing payload".to_string()))?;
    let mut fields = BTreeMap::new();

    match format {
        WireFormat::Json => {
            let parsed: Json =
                serde_json::from_str(body).map_err(|e| ApiError::Decode(e.to_string()))?;
            let Some(map) = parsed.get(object).and_then(Json::as_object) else {
                return Err(ApiError::Decode(format!("payload has no '{}' object", object)));
            };
            for (key, value) in map {
                let text = match value {
                    Json::String(s) => s.clone(),
                    other => other.to_string(),
                };
                fields.insert(key.clone(), text);
            }
        }
        WireFormat::Xml => {
            let mut reader = Reader::from_str(body);
            reader.config_mut().trim_text(true);
            let mut depth = 0;
            let mut current: Option<String> = None;
            loop {
                match reader.read_event().map_err(|e| ApiError::Decode(e.to_string()))? {
                    Event::Start(start) => {
                        depth += 1;
                        if depth == 2 {
                            let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                            fields.insert(name.clone(), String::new());
                            current = Some(name);
                        }
                    }
                    Event::Text(text) => {
                        if let Some(name) = &current {
                            let text = text.unescape().map_err(|e| ApiError::Decode(e.to_string()))?;
                            fields.insert(name.clone(), text.into_owned());
                        }
                    }
                    Event::End(_) => {
                        if depth == 2 {
                            current = None;
                        }
                        depth -= 1;
                    }
                    Event::Eof => break,
                    _ => {}
                }
            }
        }
    }
    Ok(fields)
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

impl State {
    fn user_name(&self, id: u64) -> &'static str {
        self.users.get(&id).copied().unwrap_or("Anonymous")
    }

    fn project_name(&self, id: u64) -> &'static str {
        self.projects
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.name)
            .unwrap_or_default()
    }

    fn render_issues(&self, format: WireFormat, issues: &[&FixtureIssue]) -> String {
        match format {
            WireFormat::Xml => {
                let mut out = format!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?><issues total_count=\"{}\" offset=\"0\" limit=\"25\" type=\"array\">",
                    issues.len()
                );
                for issue in issues {
                    out.push_str(&self.issue_xml(issue, false));
                }
                out.push_str("</issues>");
                out
            }
            WireFormat::Json => {
                let items: Vec<Json> = issues.iter().map(|i| self.issue_json(i, false)).collect();
                json!({ "issues": items, "total_count": issues.len(), "offset": 0, "limit": 25 })
                    .to_string()
            }
        }
    }

    fn render_issue(&self, format: WireFormat, issue: &FixtureIssue, journals: bool) -> String {
        match format {
            WireFormat::Xml => format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>{}",
                self.issue_xml(issue, journals)
            ),
            WireFormat::Json => json!({ "issue": self.issue_json(issue, journals) }).to_string(),
        }
    }

    fn issue_xml(&self, issue: &FixtureIssue, journals: bool) -> String {
        let mut out = String::from("<issue>");
        out.push_str(&format!("<id>{}</id>", issue.id));
        out.push_str(&format!(
            "<project id=\"{}\" name=\"{}\"/>",
            issue.project_id,
            escape(self.project_name(issue.project_id))
        ));
        out.push_str(&format!(
            "<author id=\"{}\" name=\"{}\"/>",
            issue.author_id,
            self.user_name(issue.author_id)
        ));
        if let Some(id) = issue.assigned_to_id {
            out.push_str(&format!("<assigned_to id=\"{}\" name=\"{}\"/>", id, self.user_name(id)));
        }
        if let Some(id) = issue.parent_id {
            out.push_str(&format!("<parent id=\"{}\"/>", id));
        }
        out.push_str(&format!("<subject>{}</subject>", escape(&issue.subject)));
        out.push_str(&format!("<description>{}</description>", escape(&issue.description)));
        match issue.start_date {
            Some((y, m, d)) => out.push_str(&format!("<start_date>{:04}-{:02}-{:02}</start_date>", y, m, d)),
            None => out.push_str("<start_date></start_date>"),
        }
        out.push_str("<due_date></due_date>");
        out.push_str("<done_ratio>0</done_ratio>");
        out.push_str("<created_on>2006-07-19T21:02:17+02:00</created_on>");
        out.push_str("<updated_on>2006-07-19T21:04:21+02:00</updated_on>");
        if journals {
            out.push_str("<journals type=\"array\">");
            for journal in &issue.journals {
                out.push_str(&format!(
                    "<journal id=\"{}\"><user id=\"{}\" name=\"{}\"/><notes>{}</notes><created_on>2006-07-19T21:07:27+02:00</created_on><details type=\"array\"/></journal>",
                    journal.id,
                    journal.user_id,
                    self.user_name(journal.user_id),
                    escape(&journal.notes)
                ));
            }
            out.push_str("</journals>");
        }
        out.push_str("</issue>");
        out
    }

    fn issue_json(&self, issue: &FixtureIssue, journals: bool) -> Json {
        let mut value = json!({
            "id": issue.id,
            "project": { "id": issue.project_id, "name": self.project_name(issue.project_id) },
            "author": { "id": issue.author_id, "name": self.user_name(issue.author_id) },
            "subject": issue.subject,
            "description": issue.description,
            "done_ratio": 0,
            "estimated_hours": 1.50,
            "created_on": "2006/07/19 21:02:17 +0200",
            "updated_on": "2006/07/19 21:04:21 +0200",
        });
        if let Some(id) = issue.assigned_to_id {
            value["assigned_to"] = json!({ "id": id, "name": self.user_name(id) });
        }
        if let Some(id) = issue.parent_id {
            value["parent"] = json!({ "id": id });
        }
        if let Some((y, m, d)) = issue.start_date {
            value["start_date"] = json!(format!("{:04}/{:02}/{:02}", y, m, d));
        }
        if journals {
            let items: Vec<Json> = issue
                .journals
                .iter()
                .map(|j| {
                    json!({
                        "id": j.id,
                        "user": { "id": j.user_id, "name": self.user_name(j.user_id) },
                        "notes": j.notes,
                        "created_on": "2006/07/19 21:07:27 +0200",
                        "details": [],
                    })
                })
                .collect();
            value["journals"] = Json::Array(items);
        }
        value
    }

    fn render_projects(&self, format: WireFormat) -> String {
        match format {
            WireFormat::Xml => {
                let mut out = format!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\"?><projects total_count=\"{}\" offset=\"0\" limit=\"25\" type=\"array\">",
                    self.projects.len()
                );
                for project in &self.projects {
                    out.push_str(&project_xml(project));
                }
                out.push_str("</projects>");
                out
            }
            WireFormat::Json => {
                let items: Vec<Json> = self.projects.iter().map(project_json).collect();
                json!({ "projects": items, "total_count": self.projects.len() }).to_string()
            }
        }
    }

    fn render_project(&self, format: WireFormat, project: &FixtureProject) -> String {
        match format {
            WireFormat::Xml => format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>{}",
                project_xml(project)
            ),
            WireFormat::Json => json!({ "project": project_json(project) }).to_string(),
        }
    }

    fn render_errors(&self, format: WireFormat) -> String {
        match format {
            WireFormat::Xml => {
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?><errors type=\"array\"><error>Subject cannot be blank</error></errors>"
                    .to_string()
            }
            WireFormat::Json => json!({ "errors": ["Subject cannot be blank"] }).to_string(),
        }
    }
}

fn project_xml(project: &FixtureProject) -> String {
    let parent = project
        .parent_id
        .map(|id| format!("<parent id=\"{}\"/>", id))
        .unwrap_or_default();
    format!(
        "<project><id>{}</id><name>{}</name><identifier>{}</identifier>{}<created_on>2006-07-19T17:13:59+02:00</created_on></project>",
        project.id,
        escape(project.name),
        project.identifier,
        parent
    )
}

fn project_json(project: &FixtureProject) -> Json {
    let mut value = json!({
        "id": project.id,
        "name": project.name,
        "identifier": project.identifier,
        "created_on": "2006/07/19 17:13:59 +0200",
    });
    if let Some(id) = project.parent_id {
        value["parent"] = json!({ "id": id });
    }
    value
}
