use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use similar::TextDiff;
use tracing::{debug, info, warn};

use crate::descriptor::{PluginDescriptor, validate_descriptor};
use crate::directory::{PageDirectory, RemotePage, same_body};
use crate::error::{DirectoryError, InputError, SyncError};
use crate::render::{Messages, render_goal, render_plugin};
use crate::session::{Credentials, with_session};

pub const DEFAULT_PARENT_PAGE: &str = "Home";

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub space_key: String,
    /// Existing page the plugin overview page is created under.
    pub parent_page_title: String,
    /// Look pages up but never create or update them.
    pub dry_run: bool,
    /// In dry runs, attach a unified diff of every body change to its result.
    pub show_diff: bool,
    pub messages: Messages,
}

impl SyncOptions {
    pub fn new(space_key: impl Into<String>) -> Self {
        Self {
            space_key: space_key.into(),
            parent_page_title: DEFAULT_PARENT_PAGE.to_string(),
            dry_run: false,
            show_diff: false,
            messages: Messages::default(),
        }
    }

    fn validate(&self) -> Result<(), InputError> {
        if self.space_key.trim().is_empty() {
            return Err(InputError::MissingSetting("space key"));
        }
        if self.parent_page_title.trim().is_empty() {
            return Err(InputError::MissingSetting("parent page title"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Created,
    Updated,
    Unchanged,
    Failed,
}

impl SyncOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    Plugin,
    Goal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub title: String,
    pub kind: PageKind,
    pub outcome: SyncOutcome,
    /// Page state after the run. `None` for failures and for pages a dry
    /// run would create.
    pub page: Option<RemotePage>,
    pub cause: Option<String>,
    pub diff: Option<String>,
}

impl SyncResult {
    fn new(title: &str, kind: PageKind, outcome: SyncOutcome, page: Option<RemotePage>) -> Self {
        Self {
            title: title.to_string(),
            kind,
            outcome,
            page,
            cause: None,
            diff: None,
        }
    }

    fn failed(title: &str, kind: PageKind, cause: impl Into<String>) -> Self {
        Self {
            cause: Some(cause.into()),
            ..Self::new(title, kind, SyncOutcome::Failed, None)
        }
    }

    fn with_diff(mut self, diff: Option<String>) -> Self {
        self.diff = diff;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub success: bool,
    pub dry_run: bool,
    pub space_key: String,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
    pub pages: Vec<SyncResult>,
    pub request_count: usize,
}

impl SyncReport {
    fn new(options: &SyncOptions) -> Self {
        Self {
            success: true,
            dry_run: options.dry_run,
            space_key: options.space_key.clone(),
            created: 0,
            updated: 0,
            unchanged: 0,
            failed: 0,
            pages: Vec::new(),
            request_count: 0,
        }
    }

    fn record(&mut self, result: SyncResult) {
        match result.outcome {
            SyncOutcome::Created => self.created += 1,
            SyncOutcome::Updated => self.updated += 1,
            SyncOutcome::Unchanged => self.unchanged += 1,
            SyncOutcome::Failed => self.failed += 1,
        }
        self.success = self.failed == 0;
        self.pages.push(result);
    }

    pub fn failures(&self) -> impl Iterator<Item = &SyncResult> {
        self.pages
            .iter()
            .filter(|page| page.outcome == SyncOutcome::Failed)
    }

    pub fn outcome_of(&self, title: &str) -> Option<SyncOutcome> {
        self.pages
            .iter()
            .find(|page| page.title == title)
            .map(|page| page.outcome)
    }
}

/// Log in, synchronize, and log out again on every exit path.
pub fn publish<D: PageDirectory>(
    directory: &mut D,
    descriptor: &PluginDescriptor,
    credentials: &Credentials,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError> {
    options.validate()?;
    validate_descriptor(descriptor)?;
    with_session(directory, credentials, |directory| {
        synchronize(directory, descriptor, options)
    })
}

/// Bring the plugin page and one page per goal in line with `descriptor`.
///
/// The directory must already hold a session. Only input errors and a
/// missing parent page abort the run; page-level failures are recorded in
/// the report and the remaining goals are still attempted.
pub fn synchronize<D: PageDirectory>(
    directory: &mut D,
    descriptor: &PluginDescriptor,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError> {
    options.validate()?;
    validate_descriptor(descriptor)?;

    let space = options.space_key.as_str();
    let parent = directory
        .find_page(space, &options.parent_page_title)
        .map_err(SyncError::Directory)?
        .ok_or_else(|| SyncError::ParentPageMissing {
            space: space.to_string(),
            title: options.parent_page_title.clone(),
        })?;
    debug!(parent = %parent.title, id = %parent.id, "resolved parent page");

    let mut report = SyncReport::new(options);
    let root_title = descriptor.root_title();
    let root_body = render_plugin(descriptor, &options.messages).to_storage();
    let root = sync_page(
        directory,
        options,
        PageKind::Plugin,
        root_title,
        Some(&parent.id),
        &root_body,
    );
    let root_failed = root.outcome == SyncOutcome::Failed;
    let root_id = root.page.as_ref().map(|page| page.id.clone());
    report.record(root);

    for goal in &descriptor.goals {
        let title = goal.canonical_title();
        if root_failed {
            report.record(SyncResult::failed(
                title,
                PageKind::Goal,
                format!("parent page `{root_title}` unavailable"),
            ));
            continue;
        }
        let body = render_goal(descriptor, goal, &options.messages).to_storage();
        let result = sync_page(
            directory,
            options,
            PageKind::Goal,
            title,
            root_id.as_deref(),
            &body,
        );
        report.record(result);
    }

    report.request_count = directory.request_count();
    info!(
        created = report.created,
        updated = report.updated,
        unchanged = report.unchanged,
        failed = report.failed,
        dry_run = report.dry_run,
        "synchronization finished"
    );
    Ok(report)
}

fn sync_page<D: PageDirectory>(
    directory: &mut D,
    options: &SyncOptions,
    kind: PageKind,
    title: &str,
    parent_id: Option<&str>,
    body: &str,
) -> SyncResult {
    match resolve_page(directory, options, kind, title, parent_id, body) {
        Ok(result) => {
            info!(title, outcome = result.outcome.as_str(), "page synchronized");
            result
        }
        Err(error) => {
            warn!(title, %error, "page synchronization failed");
            SyncResult::failed(title, kind, error.to_string())
        }
    }
}

fn resolve_page<D: PageDirectory>(
    directory: &mut D,
    options: &SyncOptions,
    kind: PageKind,
    title: &str,
    parent_id: Option<&str>,
    body: &str,
) -> Result<SyncResult, DirectoryError> {
    let space = options.space_key.as_str();
    if let Some(existing) = directory.find_page(space, title)? {
        return refresh_page(directory, options, kind, title, existing, parent_id, body);
    }

    if options.dry_run {
        let diff = options.show_diff.then(|| unified_diff("", body));
        return Ok(SyncResult::new(title, kind, SyncOutcome::Created, None).with_diff(diff));
    }
    let parent_id = parent_id
        .ok_or_else(|| DirectoryError::RemoteWrite(format!("no parent page for `{title}`")))?;

    match directory.create_page(space, title, parent_id, body) {
        Ok(page) => Ok(SyncResult::new(title, kind, SyncOutcome::Created, Some(page))),
        Err(DirectoryError::Conflict { .. }) => {
            debug!(title, "page appeared concurrently, resolving again");
            let found = directory.find_page(space, title).map_err(|error| {
                DirectoryError::RemoteWrite(format!(
                    "`{title}` already exists but could not be looked up again: {error}"
                ))
            })?;
            match found {
                Some(existing) => {
                    refresh_page(directory, options, kind, title, existing, Some(parent_id), body)
                }
                None => Err(DirectoryError::RemoteWrite(format!(
                    "`{title}` was reported as existing but cannot be found"
                ))),
            }
        }
        Err(error) => Err(error),
    }
}

fn refresh_page<D: PageDirectory>(
    directory: &mut D,
    options: &SyncOptions,
    kind: PageKind,
    title: &str,
    existing: RemotePage,
    parent_id: Option<&str>,
    body: &str,
) -> Result<SyncResult, DirectoryError> {
    // Pages keep the parent they were created under.
    if let (Some(expected), Some(actual)) = (parent_id, existing.parent_id.as_deref())
        && expected != actual
    {
        warn!(
            title = %existing.title,
            expected,
            actual,
            "page lives under a different parent; leaving it in place"
        );
    }

    if same_body(&existing.body, body) {
        return Ok(SyncResult::new(title, kind, SyncOutcome::Unchanged, Some(existing)));
    }

    if options.dry_run {
        let diff = options.show_diff.then(|| unified_diff(&existing.body, body));
        return Ok(
            SyncResult::new(title, kind, SyncOutcome::Updated, Some(existing)).with_diff(diff),
        );
    }
    let updated = directory.update_page(&existing, body)?;
    Ok(SyncResult::new(title, kind, SyncOutcome::Updated, Some(updated)))
}

fn unified_diff(remote: &str, rendered: &str) -> String {
    TextDiff::from_lines(remote, rendered)
        .unified_diff()
        .context_radius(2)
        .header("remote", "rendered")
        .to_string()
}

/// Write every page as wiki markup into `out_dir`, one `<title>.wiki` file
/// per page, root first. Nothing remote is touched.
pub fn render_to_directory(
    descriptor: &PluginDescriptor,
    messages: &Messages,
    out_dir: &Path,
) -> Result<Vec<PathBuf>, SyncError> {
    validate_descriptor(descriptor)?;
    fs::create_dir_all(out_dir).map_err(|source| SyncError::Io {
        path: out_dir.display().to_string(),
        source,
    })?;

    let mut pages = vec![(
        descriptor.root_title().to_string(),
        render_plugin(descriptor, messages).to_wiki(),
    )];
    for goal in &descriptor.goals {
        pages.push((
            goal.canonical_title().to_string(),
            render_goal(descriptor, goal, messages).to_wiki(),
        ));
    }

    let mut written = Vec::with_capacity(pages.len());
    for (title, content) in pages {
        let path = out_dir.join(format!("{}.wiki", file_stem(&title)));
        fs::write(&path, content).map_err(|source| SyncError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "rendered page");
        written.push(path);
    }
    info!(pages = written.len(), dir = %out_dir.display(), "rendered pages to directory");
    Ok(written)
}

fn file_stem(title: &str) -> String {
    title
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{goal, sample_descriptor};
    use crate::memory::MemoryDirectory;
    use tempfile::tempdir;

    const SPACE: &str = "DOC";

    fn credentials() -> Credentials {
        Credentials {
            username: "admin".to_string(),
            password: "secret".to_string(),
        }
    }

    fn options() -> SyncOptions {
        SyncOptions::new(SPACE)
    }

    fn run(directory: &mut MemoryDirectory, descriptor: &PluginDescriptor) -> SyncReport {
        publish(directory, descriptor, &credentials(), &options()).expect("publish")
    }

    #[test]
    fn example_scenario_creates_root_and_goal_pages() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        let home_id = directory.page(SPACE, "Home").expect("home").id.clone();

        let report = run(&mut directory, &sample_descriptor());

        assert!(report.success);
        assert_eq!(
            (report.created, report.updated, report.unchanged, report.failed),
            (2, 0, 0, 0)
        );
        let root = directory.page(SPACE, "demo").expect("root page");
        assert_eq!(root.parent_id.as_deref(), Some(home_id.as_str()));
        let build = directory.page(SPACE, "build").expect("goal page");
        assert_eq!(build.parent_id.as_deref(), Some(root.id.as_str()));
        assert!(build.body.contains("verbose"));
        assert_eq!(directory.logouts, 1);
    }

    #[test]
    fn second_run_reports_every_page_unchanged() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        let mut descriptor = sample_descriptor();
        descriptor.goals.push(goal("deploy"));

        run(&mut directory, &descriptor);
        directory.calls.clear();
        let report = run(&mut directory, &descriptor);

        assert!(report.success);
        assert_eq!(report.unchanged, 3);
        assert_eq!(report.created + report.updated + report.failed, 0);
        assert!(directory.mutations().is_empty());
    }

    #[test]
    fn adding_a_goal_creates_exactly_one_page() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        let mut descriptor = sample_descriptor();
        run(&mut directory, &descriptor);
        let build_version = directory.page(SPACE, "build").expect("build").version;

        descriptor.goals.push(goal("deploy"));
        directory.calls.clear();
        let report = run(&mut directory, &descriptor);

        assert_eq!(report.created, 1);
        assert_eq!(report.outcome_of("deploy"), Some(SyncOutcome::Created));
        assert_eq!(report.outcome_of("build"), Some(SyncOutcome::Unchanged));
        // The overview table gained a row.
        assert_eq!(report.outcome_of("demo"), Some(SyncOutcome::Updated));
        assert_eq!(directory.mutations(), vec!["update:demo", "create:deploy"]);
        assert_eq!(
            directory.page(SPACE, "build").expect("build").version,
            build_version
        );
    }

    #[test]
    fn changed_description_updates_only_that_goal() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        let mut descriptor = sample_descriptor();
        descriptor.goals.push(goal("deploy"));
        run(&mut directory, &descriptor);

        descriptor.goals[1].parameters.push(crate::descriptor::ParameterDescriptor {
            name: "target".to_string(),
            value_type: "String".to_string(),
            required: true,
            default_value: None,
            description: Some("Where to deploy.".to_string()),
        });
        let report = run(&mut directory, &descriptor);

        assert_eq!(report.outcome_of("deploy"), Some(SyncOutcome::Updated));
        assert_eq!(report.outcome_of("build"), Some(SyncOutcome::Unchanged));
        assert_eq!(report.outcome_of("demo"), Some(SyncOutcome::Unchanged));
        assert_eq!(directory.page(SPACE, "deploy").expect("deploy").version, 2);
    }

    #[test]
    fn duplicate_goals_are_rejected_before_any_remote_call() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        let mut descriptor = sample_descriptor();
        descriptor.goals.push(descriptor.goals[0].clone());

        let error = publish(&mut directory, &descriptor, &credentials(), &options())
            .expect_err("must fail");

        assert!(matches!(error, SyncError::Input(InputError::DuplicateGoal(_))));
        assert!(directory.calls.is_empty());
        assert_eq!(directory.request_count(), 0);
    }

    #[test]
    fn empty_space_key_is_an_input_error() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        let error = publish(
            &mut directory,
            &sample_descriptor(),
            &credentials(),
            &SyncOptions::new(" "),
        )
        .expect_err("must fail");
        assert!(matches!(
            error,
            SyncError::Input(InputError::MissingSetting("space key"))
        ));
        assert!(directory.calls.is_empty());
    }

    #[test]
    fn every_goal_page_hangs_off_the_root_page() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        let mut descriptor = sample_descriptor();
        descriptor.goals.push(goal("deploy"));
        descriptor.goals.push(goal("clean"));

        run(&mut directory, &descriptor);

        let root_id = directory.page(SPACE, "demo").expect("root").id.clone();
        for title in ["build", "deploy", "clean"] {
            let page = directory.page(SPACE, title).expect("goal page");
            assert_eq!(page.parent_id.as_deref(), Some(root_id.as_str()));
        }
    }

    #[test]
    fn goals_are_processed_in_descriptor_order_after_the_root() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        let mut descriptor = sample_descriptor();
        descriptor.goals.insert(0, goal("zeta"));
        descriptor.goals.push(goal("alpha"));

        run(&mut directory, &descriptor);

        assert_eq!(
            directory.mutations(),
            vec!["create:demo", "create:zeta", "create:build", "create:alpha"]
        );
    }

    #[test]
    fn failed_update_does_not_stop_later_goals() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        let mut descriptor = sample_descriptor();
        descriptor.goals.push(goal("deploy"));
        descriptor.goals.push(goal("clean"));
        run(&mut directory, &descriptor);

        descriptor.goals[1].description = "Deploys somewhere else.".to_string();
        descriptor.goals[2].description = "Cleans harder.".to_string();
        directory.fail_updates.insert("deploy".to_string());
        let report = run(&mut directory, &descriptor);

        assert!(!report.success);
        assert_eq!(report.failed, 1);
        assert_eq!(report.outcome_of("deploy"), Some(SyncOutcome::Failed));
        assert_eq!(report.outcome_of("clean"), Some(SyncOutcome::Updated));
        let failures = report.failures().collect::<Vec<_>>();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].title, "deploy");
        assert!(
            failures[0]
                .cause
                .as_deref()
                .unwrap_or_default()
                .contains("remote write failed")
        );
        assert_eq!(directory.logouts, 2);
    }

    #[test]
    fn failed_lookup_is_recorded_and_siblings_continue() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        let mut descriptor = sample_descriptor();
        descriptor.goals.push(goal("deploy"));
        directory.fail_lookups.insert("build".to_string());

        let report = run(&mut directory, &descriptor);

        assert_eq!(report.outcome_of("build"), Some(SyncOutcome::Failed));
        assert_eq!(report.outcome_of("deploy"), Some(SyncOutcome::Created));
    }

    #[test]
    fn failed_root_marks_goals_failed_without_creating_orphans() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        directory.fail_creates.insert("demo".to_string());

        let report = run(&mut directory, &sample_descriptor());

        assert_eq!(report.failed, 2);
        assert_eq!(report.outcome_of("demo"), Some(SyncOutcome::Failed));
        let build = report
            .pages
            .iter()
            .find(|page| page.title == "build")
            .expect("build result");
        assert_eq!(build.outcome, SyncOutcome::Failed);
        assert!(build.cause.as_deref().unwrap_or_default().contains("unavailable"));
        assert_eq!(directory.mutations(), vec!["create:demo"]);
    }

    #[test]
    fn missing_parent_page_aborts_and_still_logs_out() {
        let mut directory = MemoryDirectory::default();

        let error = publish(
            &mut directory,
            &sample_descriptor(),
            &credentials(),
            &options(),
        )
        .expect_err("must fail");

        assert!(matches!(error, SyncError::ParentPageMissing { .. }));
        assert!(directory.mutations().is_empty());
        assert_eq!(directory.logouts, 1);
    }

    #[test]
    fn login_failure_aborts_before_page_operations() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        directory.reject_login = true;

        let error = publish(
            &mut directory,
            &sample_descriptor(),
            &credentials(),
            &options(),
        )
        .expect_err("must fail");

        assert!(matches!(error, SyncError::Auth(_)));
        assert_eq!(directory.calls, vec!["login:admin"]);
    }

    #[test]
    fn creation_race_falls_back_to_the_existing_page() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        directory.racing_creates.insert("build".to_string());

        let report = run(&mut directory, &sample_descriptor());

        assert!(report.success);
        assert_eq!(report.outcome_of("build"), Some(SyncOutcome::Updated));
        let build = directory.page(SPACE, "build").expect("build");
        assert!(build.body.contains("verbose"));
        assert_eq!(build.version, 2);
    }

    #[test]
    fn creation_race_without_a_page_is_a_write_failure() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        directory.racing_creates.insert("build".to_string());
        directory.vanishing_races.insert("build".to_string());

        let report = run(&mut directory, &sample_descriptor());

        let build = report
            .pages
            .iter()
            .find(|page| page.title == "build")
            .expect("build result");
        assert_eq!(build.outcome, SyncOutcome::Failed);
        assert!(build.cause.as_deref().unwrap_or_default().contains("cannot be found"));
    }

    #[test]
    fn failed_lookup_after_conflict_is_a_write_failure() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        let mut descriptor = sample_descriptor();
        descriptor.goals.push(goal("deploy"));
        directory.racing_creates.insert("build".to_string());
        directory.failing_relookups.insert("build".to_string());

        let report = run(&mut directory, &descriptor);

        let build = report
            .pages
            .iter()
            .find(|page| page.title == "build")
            .expect("build result");
        assert_eq!(build.outcome, SyncOutcome::Failed);
        let cause = build.cause.as_deref().unwrap_or_default();
        assert!(cause.starts_with("remote write failed:"));
        assert!(cause.contains("connection reset"));
        assert_eq!(report.outcome_of("deploy"), Some(SyncOutcome::Created));
    }

    #[test]
    fn diffs_are_only_attached_in_dry_runs() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        directory.seed(SPACE, "build", Some("1"), "<p>old</p>\n");
        let options = SyncOptions {
            show_diff: true,
            ..options()
        };

        let report = publish(
            &mut directory,
            &sample_descriptor(),
            &credentials(),
            &options,
        )
        .expect("publish");

        assert_eq!(report.outcome_of("build"), Some(SyncOutcome::Updated));
        assert!(report.pages.iter().all(|page| page.diff.is_none()));
    }

    #[test]
    fn blank_full_goal_names_publish_distinct_pages() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        let mut descriptor = sample_descriptor();
        descriptor.goals[0].full_goal_name = String::new();
        let mut deploy = goal("deploy");
        deploy.full_goal_name = String::new();
        descriptor.goals.push(deploy);

        let report = run(&mut directory, &descriptor);

        assert!(report.success);
        assert_eq!(report.created, 3);
        let build = directory.page(SPACE, "build").expect("build page");
        assert!(build.body.starts_with("<h1>demo:build</h1>"));
    }

    #[test]
    fn goals_differing_only_in_case_are_rejected_before_login() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        let mut descriptor = sample_descriptor();
        descriptor.goals.push(goal("Build"));

        let error = publish(&mut directory, &descriptor, &credentials(), &options())
            .expect_err("must fail");

        assert!(matches!(
            error,
            SyncError::Input(InputError::DuplicateTitle { .. })
        ));
        assert!(directory.calls.is_empty());
    }

    #[test]
    fn existing_pages_are_never_moved() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        let elsewhere = directory.seed(SPACE, "Archive", None, "");
        directory.seed(SPACE, "build", Some(&elsewhere.id), "<p>old</p>");

        let report = run(&mut directory, &sample_descriptor());

        assert_eq!(report.outcome_of("build"), Some(SyncOutcome::Updated));
        let build = directory.page(SPACE, "build").expect("build");
        assert_eq!(build.parent_id.as_deref(), Some(elsewhere.id.as_str()));
    }

    #[test]
    fn dry_run_reports_planned_changes_without_writing() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        directory.seed(SPACE, "build", Some("1"), "<p>old</p>\n");
        let options = SyncOptions {
            dry_run: true,
            show_diff: true,
            ..options()
        };

        let report = publish(
            &mut directory,
            &sample_descriptor(),
            &credentials(),
            &options,
        )
        .expect("publish");

        assert!(report.dry_run);
        assert_eq!(report.outcome_of("demo"), Some(SyncOutcome::Created));
        assert_eq!(report.outcome_of("build"), Some(SyncOutcome::Updated));
        assert!(directory.mutations().is_empty());
        let diff = report.pages[1].diff.as_deref().expect("diff");
        assert!(diff.contains("-<p>old</p>"));
        assert!(diff.contains("+<h1>demo:build</h1>"));
    }

    #[test]
    fn report_serializes_outcomes_in_snake_case() {
        let mut directory = MemoryDirectory::with_home(SPACE);
        let report = run(&mut directory, &sample_descriptor());
        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["created"], 2);
        assert_eq!(json["pages"][0]["outcome"], "created");
        assert_eq!(json["pages"][0]["kind"], "plugin");
        assert!(json["pages"][0]["page"].get("body").is_none());
    }

    #[test]
    fn render_to_directory_writes_one_wiki_file_per_page() {
        let temp = tempdir().expect("tempdir");
        let out_dir = temp.path().join("site");
        let mut descriptor = sample_descriptor();
        descriptor.goals.push(goal("deploy"));

        let written = render_to_directory(&descriptor, &Messages::default(), &out_dir)
            .expect("render");

        let names: Vec<String> = written
            .iter()
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["demo.wiki", "build.wiki", "deploy.wiki"]);
        let root = fs::read_to_string(out_dir.join("demo.wiki")).expect("read root");
        assert!(root.starts_with("h1. demo"));
        assert!(root.contains("[demo:build|build]"));
    }

    #[test]
    fn render_to_directory_rejects_invalid_descriptor_before_writing() {
        let temp = tempdir().expect("tempdir");
        let out_dir = temp.path().join("site");
        let mut descriptor = sample_descriptor();
        descriptor.artifact_id = " ".to_string();

        let error = render_to_directory(&descriptor, &Messages::default(), &out_dir)
            .expect_err("must fail");
        assert!(matches!(error, SyncError::Input(InputError::EmptyArtifactId)));
        assert!(!out_dir.exists());
    }

    #[test]
    fn file_stem_replaces_path_separators() {
        assert_eq!(file_stem("a/b:c"), "a_b_c");
        assert_eq!(file_stem("build"), "build");
    }
}
