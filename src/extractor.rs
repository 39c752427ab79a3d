//! Best-effort profile extraction from LinkedIn profile markup.
//!
//! Every field is resolved through an ordered cascade of CSS selectors (first
//! match wins) followed by regex mining over the page's visible text. The
//! selector lists are hard-coded to LinkedIn's current markup and silently
//! degrade to empty fields when that markup changes; extraction itself never
//! fails — worst case is a record with the placeholder name.

use std::time::Duration;

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use utoipa::ToSchema;

/// Name used when no real name could be resolved from the page.
pub const PLACEHOLDER_NAME: &str = "Unknown User";

const MAX_EXPERIENCE_ITEMS: usize = 6;
const MAX_EDUCATION_ITEMS: usize = 4;
const MAX_SKILL_ITEMS: usize = 8;
const MAX_MINED_EXPERIENCE: usize = 5;
const MAX_MINED_EDUCATION: usize = 3;

const RETRY_ATTEMPTS: u32 = 5;
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Structured result of one scrape attempt.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct ProfileRecord {
    pub name: String,
    pub headline: String,
    pub about: String,
    pub experience: Vec<String>,
    pub education: Vec<String>,
    pub skills: Vec<String>,
    pub website: Option<String>,
    pub profile_url: String,
}

impl ProfileRecord {
    pub fn placeholder(url: &str) -> Self {
        Self {
            name: PLACEHOLDER_NAME.to_string(),
            headline: "Professional".to_string(),
            profile_url: url.to_string(),
            ..Default::default()
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.name == PLACEHOLDER_NAME
    }
}

/// True for LinkedIn's per-person profile pages.
pub fn is_profile_url(url: &str) -> bool {
    match reqwest::Url::parse(url) {
        Ok(u) => u.host_str() == Some("www.linkedin.com") && u.path().starts_with("/in/"),
        Err(_) => false,
    }
}

// ============================================================================
// Heuristic word tables
// ============================================================================

static KNOWN_COMPANIES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "LinkedIn", "Google", "Meta", "Instagram", "Facebook", "Microsoft", "Apple", "Amazon",
        "Netflix", "Uber", "Twitter", "Snapchat", "TikTok", "Spotify", "Dropbox", "Zoom",
        "Slack", "Salesforce", "Oracle", "Adobe", "Nvidia", "Intel", "IBM", "Cisco", "VMware",
        "Tesla", "Airbnb", "Stripe", "Shopify", "PayPal", "eBay", "Yahoo", "HP", "Dell", "SAP",
        "Accenture", "Deloitte", "McKinsey", "BCG", "Bain", "Goldman Sachs", "Morgan Stanley",
        "JPMorgan", "HubSpot", "Ahold Delhaize", "FleishmanHillard", "Costello Real Estate",
        "ClassDojo", "Patreon", "Interview Master",
    ]
});

static JOB_TITLE_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "engineer", "scientist", "analyst", "manager", "director", "lead", "senior", "principal",
        "staff", "intern", "fellow", "consultant", "specialist", "coordinator", "associate",
        "developer", "designer", "recruiter", "founder", "co-founder", "president", "ceo", "cto",
        "vice president", "vp", "head of", "research", "assistant",
    ]
});

static DEGREE_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "bachelor", "master", "phd", "doctorate", "associate", "certificate", "diploma",
        "b.s", "b.a", "m.s", "m.a", "mba", "j.d", "md",
    ]
});

static MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec").unwrap());
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").unwrap());
static DURATION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d{1,2}\s+mos?").unwrap());
static TITLECASE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][a-z].*[a-z]$").unwrap());
static SCHOOL_SHAPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][a-zA-Z\s&,.\-]+$").unwrap());
static CORPORATE_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(Inc|LLC|Corp|Company|Ltd|Group|Technologies|Systems|Solutions|University|College|Institute|School)\b").unwrap()
});
static TITLE_PATTERN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(Software Engineer|Data Scientist|Product Manager|Engineering Manager|Technical Lead|Senior Engineer|Staff Engineer|Principal Engineer|Research Assistant|Intern|Fellow|Consultant|Analyst|Developer|Designer|Recruiter|Specialist|Coordinator|Associate|Director|Vice President|VP|President|CEO|CTO|Founder|Co-Founder)\b").unwrap()
});

// ============================================================================
// DOM helpers
// ============================================================================

fn collapse_text(el: &ElementRef) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn first_text(doc: &Html, selectors: &[&str]) -> String {
    for s in selectors {
        if let Ok(sel) = Selector::parse(s) {
            for el in doc.select(&sel) {
                let text = collapse_text(&el);
                if !text.is_empty() {
                    return text;
                }
            }
        }
    }
    String::new()
}

fn enclosing_section<'a>(el: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "section")
}

/// All visible text on the page, script/style content excluded.
fn visible_text(doc: &Html) -> String {
    let mut out = String::new();
    for node in doc.root_element().descendants() {
        if let Some(text) = node.value().as_text() {
            let hidden = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .next()
                .map(|p| matches!(p.value().name(), "script" | "style" | "noscript"))
                .unwrap_or(false);
            if !hidden {
                out.push_str(text);
                out.push('\n');
            }
        }
    }
    out
}

// ============================================================================
// Field extraction
// ============================================================================

fn extract_name(doc: &Html) -> String {
    let name = first_text(
        doc,
        &[
            "h1.text-heading-xlarge.inline.t-24.v-align-middle.break-words",
            r#"h1[data-anonymize="person-name"]"#,
            ".pv-text-details__left-panel h1",
            "h1.text-heading-xlarge",
            ".profile-photo-edit__preview h1",
            "h1",
        ],
    );
    if !name.is_empty() {
        return name;
    }

    // Page title up to the first pipe.
    if let Ok(sel) = Selector::parse("title") {
        if let Some(el) = doc.select(&sel).next() {
            let title = el.text().collect::<String>();
            let candidate = title.split('|').next().unwrap_or("").trim().to_string();
            if !candidate.is_empty() && !candidate.contains("LinkedIn") {
                return candidate;
            }
        }
    }

    if let Ok(sel) = Selector::parse(r#"meta[property="og:title"]"#) {
        if let Some(content) = doc.select(&sel).next().and_then(|el| el.value().attr("content")) {
            let candidate = content.trim();
            if !candidate.is_empty() {
                return candidate.to_string();
            }
        }
    }

    // Last resort: any h1 with a person-shaped length.
    if let Ok(sel) = Selector::parse("h1") {
        for el in doc.select(&sel) {
            let text = collapse_text(&el);
            if text.len() > 2 && text.len() < 50 && !text.contains("LinkedIn") {
                return text;
            }
        }
    }

    String::new()
}

fn extract_headline(doc: &Html) -> String {
    first_text(
        doc,
        &[
            ".text-body-medium.break-words",
            r#"[data-anonymize="headline"]"#,
            ".pv-text-details__left-panel .text-body-medium",
            ".text-body-medium",
        ],
    )
}

fn extract_about(doc: &Html) -> String {
    for anchor_sel in ["#about", r#"[data-test-id="about-section"]"#] {
        let Ok(sel) = Selector::parse(anchor_sel) else { continue };
        let Some(anchor) = doc.select(&sel).next() else { continue };

        if let Some(parent) = anchor.parent().and_then(ElementRef::wrap) {
            if let Ok(content_sel) = Selector::parse(".display-flex.full-width") {
                if let Some(content) = parent.select(&content_sel).next() {
                    let text = collapse_text(&content);
                    if !text.is_empty() {
                        return text;
                    }
                }
            }
        }
        if let Some(sibling) = anchor.next_siblings().filter_map(ElementRef::wrap).next() {
            let text = collapse_text(&sibling);
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

/// Date rows, durations and employment-type rows that must never be read as a
/// job title or company name.
fn is_metadata_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    text.contains('·')
        || text.contains("mo")
        || text.contains("yr")
        || text.contains("Present")
        || text.contains('-')
        || YEAR_RE.is_match(text)
        || MONTH_RE.is_match(text)
        || DURATION_RE.is_match(text)
        || lower.contains("full-time")
        || lower.contains("part-time")
        || lower.contains("on-site")
        || lower.contains("remote")
        || lower.contains("hybrid")
        || lower.contains("contract")
}

fn aria_span_texts(item: &ElementRef) -> Vec<String> {
    let Ok(sel) = Selector::parse(r#"[aria-hidden="true"]"#) else { return Vec::new() };
    item.select(&sel)
        .map(|el| collapse_text(&el))
        .filter(|t| t.len() > 1 && t.len() < 200)
        .collect()
}

fn looks_like_job_title(text: &str) -> bool {
    let lower = text.to_lowercase();
    JOB_TITLE_KEYWORDS.iter().any(|k| lower.contains(k))
        || (TITLECASE_RE.is_match(text) && text.len() > 8 && text.len() < 80)
}

fn known_company_in(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    KNOWN_COMPANIES.iter().find(|c| lower.contains(&c.to_lowercase())).copied()
}

fn summarize_experience_item(item: &ElementRef) -> String {
    const TITLE_SELECTORS: [&str; 6] = [
        r#".display-flex.align-items-center.mr1.hoverable-link-text.t-bold span[aria-hidden="true"]"#,
        r#".mr1.hoverable-link-text.t-bold span[aria-hidden="true"]"#,
        r#".hoverable-link-text.t-bold span[aria-hidden="true"]"#,
        r#".t-bold span[aria-hidden="true"]"#,
        r#".mr1.hoverable-link-text span[aria-hidden="true"]"#,
        r#"span[aria-hidden="true"]"#,
    ];

    let mut title = String::new();
    for s in TITLE_SELECTORS {
        let Ok(sel) = Selector::parse(s) else { continue };
        for el in item.select(&sel) {
            let text = collapse_text(&el);
            if text.len() > 2 && text.len() < 200 && !is_metadata_text(&text) {
                title = text;
                break;
            }
        }
        if !title.is_empty() {
            break;
        }
    }

    // Company lives in a span after the title, either as "Acme · Full-time"
    // or as a standalone name.
    let mut company = String::new();
    let spans = aria_span_texts(item);
    let mut past_title = title.is_empty();
    for text in &spans {
        if *text == title {
            past_title = true;
            continue;
        }
        if !past_title || text.len() >= 100 {
            continue;
        }
        if let Some(first) = text.split('·').next() {
            if text.contains('·') && first.trim().len() > 1 {
                company = first.trim().to_string();
                break;
            }
        }
        if !is_metadata_text(text) {
            company = text.clone();
            break;
        }
    }

    // Some cards lead with the employer name where the title usually sits.
    if company.is_empty() && !title.is_empty() && known_company_in(&title).is_some() {
        company = title.clone();
        title.clear();
    }

    // Fallback pass over the item's combined span text.
    if title.is_empty() {
        for text in &spans {
            if !is_metadata_text(text) && looks_like_job_title(text) {
                title = text.clone();
                break;
            }
        }
    }
    if company.is_empty() {
        for text in &spans {
            if known_company_in(text).is_some() {
                company = text.split('·').next().unwrap_or(text).trim().to_string();
                break;
            }
            if !is_metadata_text(text)
                && text.len() > 3
                && text.len() < 100
                && CORPORATE_SUFFIX_RE.is_match(text)
            {
                company = text.clone();
                break;
            }
        }
    }
    if title.is_empty() {
        let all = spans.join(" ");
        if let Some(m) = TITLE_PATTERN_RE.find(&all) {
            title = m.as_str().to_string();
        }
    }

    match (title.is_empty(), company.is_empty()) {
        (false, false) => {
            let t = title.to_lowercase();
            let c = company.to_lowercase();
            if t.contains(&c) || c.contains(&t) {
                // Avoid "HubSpot at HubSpot".
                if company.len() > title.len() {
                    format!("Work at {}", company)
                } else {
                    title
                }
            } else {
                format!("{} at {}", title, company)
            }
        }
        (false, true) => title,
        (true, false) => format!("Work at {}", company),
        (true, true) => String::new(),
    }
}

fn section_items<'a>(doc: &'a Html, anchor_id: &str) -> Vec<ElementRef<'a>> {
    let Ok(anchor_sel) = Selector::parse(anchor_id) else { return Vec::new() };
    let Some(anchor) = doc.select(&anchor_sel).next() else { return Vec::new() };

    let Ok(item_sel) = Selector::parse("li.artdeco-list__item") else { return Vec::new() };
    if let Some(section) = enclosing_section(&anchor) {
        let items: Vec<_> = section.select(&item_sel).collect();
        if !items.is_empty() {
            return items;
        }
    }
    // Anchors sometimes sit next to the card rather than inside it.
    if let Ok(card_sel) = Selector::parse("section.artdeco-card.pv-profile-card") {
        for card in doc.select(&card_sel) {
            let items: Vec<_> = card.select(&item_sel).collect();
            if !items.is_empty() {
                return items;
            }
        }
    }
    Vec::new()
}

fn extract_experience(doc: &Html) -> Vec<String> {
    section_items(doc, "#experience")
        .into_iter()
        .take(MAX_EXPERIENCE_ITEMS)
        .map(|item| summarize_experience_item(&item))
        .filter(|e| e.len() > 2)
        .collect()
}

fn looks_like_school(text: &str) -> bool {
    text.contains("University")
        || text.contains("College")
        || text.contains("School")
        || text.contains("Institute")
        || text.contains("Academy")
        || text.contains("Technology")
        || (SCHOOL_SHAPE_RE.is_match(text) && text.len() > 8 && text.len() < 100)
}

fn looks_like_degree(text: &str) -> bool {
    let lower = text.to_lowercase();
    DEGREE_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn summarize_education_item(item: &ElementRef) -> String {
    const SCHOOL_SELECTORS: [&str; 4] = [
        r#".display-flex.align-items-center.mr1.hoverable-link-text.t-bold span[aria-hidden="true"]"#,
        r#".mr1.hoverable-link-text.t-bold span[aria-hidden="true"]"#,
        r#".hoverable-link-text.t-bold span[aria-hidden="true"]"#,
        r#".t-bold span[aria-hidden="true"]"#,
    ];

    let mut school = String::new();
    for s in SCHOOL_SELECTORS {
        let Ok(sel) = Selector::parse(s) else { continue };
        for el in item.select(&sel) {
            let text = collapse_text(&el);
            if text.len() > 2 && text.len() < 200 && looks_like_school(&text) {
                school = text;
                break;
            }
        }
        if !school.is_empty() {
            break;
        }
    }

    let spans = aria_span_texts(item);
    let mut degree = String::new();
    let mut past_school = school.is_empty();
    for text in &spans {
        if *text == school {
            past_school = true;
            continue;
        }
        let lower = text.to_lowercase();
        if past_school
            && text.len() > 2
            && text.len() < 150
            && !is_metadata_text(text)
            && !lower.contains("activity")
            && !lower.contains("see all")
        {
            degree = text.clone();
            break;
        }
    }

    // Fallback scans mirror the experience path.
    if school.is_empty() {
        for text in &spans {
            if !is_metadata_text(text) && looks_like_school(text) {
                school = text.clone();
                break;
            }
        }
    }
    if degree.is_empty() {
        for text in &spans {
            if *text != school && !is_metadata_text(text) && looks_like_degree(text) {
                degree = text.clone();
                break;
            }
        }
    }

    match (degree.is_empty(), school.is_empty()) {
        (false, false) => format!("{} from {}", degree, school),
        (true, false) => format!("Education at {}", school),
        (false, true) => degree,
        (true, true) => String::new(),
    }
}

fn extract_education(doc: &Html) -> Vec<String> {
    section_items(doc, "#education")
        .into_iter()
        .take(MAX_EDUCATION_ITEMS)
        .map(|item| summarize_education_item(&item))
        .filter(|e| e.len() > 2)
        .collect()
}

fn extract_skills(doc: &Html) -> Vec<String> {
    let mut anchor = None;
    for s in ["#skills", r#"[data-test-id="skills-section"]"#] {
        if let Ok(sel) = Selector::parse(s) {
            if let Some(el) = doc.select(&sel).next() {
                anchor = Some(el);
                break;
            }
        }
    }
    let Some(anchor) = anchor else { return Vec::new() };

    let scope = anchor.parent().and_then(ElementRef::wrap).unwrap_or(anchor);
    let mut items: Vec<ElementRef> = Vec::new();
    for s in [".pvs-list__paged-list-item", ".pv-skill-category-entity"] {
        if let Ok(sel) = Selector::parse(s) {
            items = scope.select(&sel).collect();
            if !items.is_empty() {
                break;
            }
        }
    }

    items
        .into_iter()
        .take(MAX_SKILL_ITEMS)
        .filter_map(|item| {
            for s in [
                ".mr1.hoverable-link-text",
                ".pv-skill-category-entity__name",
                r#"span[aria-hidden="true"]"#,
            ] {
                if let Ok(sel) = Selector::parse(s) {
                    if let Some(el) = item.select(&sel).next() {
                        let text = collapse_text(&el);
                        if text.len() > 1 {
                            return Some(text);
                        }
                    }
                }
            }
            None
        })
        .collect()
}

fn extract_website(doc: &Html) -> Option<String> {
    let sel = Selector::parse("a[href]").ok()?;
    for el in doc.select(&sel) {
        let Some(href) = el.value().attr("href") else { continue };
        if href.starts_with("http")
            && !href.contains("linkedin.com")
            && !href.contains("mailto:")
            && (href.contains(".com") || href.contains(".org") || href.contains(".net"))
        {
            return Some(href.to_string());
        }
    }
    None
}

// ============================================================================
// Page-text mining (last-resort fallback)
// ============================================================================

static AT_COMPANY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"at\s+([A-Z][a-zA-Z&,.\- ]+(?:Inc|LLC|Corp|Company|Ltd|University|College|School|Institute)?)").unwrap()
});
static KNOWN_COMPANY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(Google|Microsoft|Apple|Amazon|Meta|Facebook|Tesla|Netflix|Uber|LinkedIn|Twitter|Oracle|Salesforce|Adobe|Nvidia|Intel|IBM|Cisco|VMware|Airbnb|Stripe|Shopify|Zoom|Slack|Dropbox|Spotify|PayPal|eBay|Yahoo|Dell|SAP|Accenture|Deloitte|McKinsey|Goldman Sachs|Morgan Stanley|JPMorgan|HubSpot)\b").unwrap()
});
static SCHOOL_OF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(University|College|School|Institute|Academy)\s+of\s+([A-Z][a-zA-Z&,.\- ]+)").unwrap()
});
static NAMED_SCHOOL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][a-zA-Z&,.\- ]+?)\s+(University|College|School|Institute|Academy)\b").unwrap()
});
static DEGREE_PHRASE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(Bachelor|Master|PhD|Doctor|Associate|Certificate|Diploma)\s+(?:of|in|degree)\s+[A-Z][a-zA-Z&,.\- ]+").unwrap()
});

fn mine_experience_from_text(text: &str, existing: &mut Vec<String>) {
    for re in [&*AT_COMPANY_RE, &*KNOWN_COMPANY_RE] {
        for caps in re.captures_iter(text) {
            let Some(m) = caps.get(1) else { continue };
            let company = m.as_str().trim();
            let lower = company.to_lowercase();
            if company.len() > 2
                && company.len() < 50
                && !lower.contains("linkedin")
                && !lower.contains("profile")
                && !existing.iter().any(|e| e.to_lowercase().contains(&lower))
            {
                existing.push(format!("Work at {}", company));
            }
            if existing.len() >= MAX_MINED_EXPERIENCE {
                return;
            }
        }
    }
}

fn mine_education_from_text(text: &str, existing: &mut Vec<String>) {
    for re in [&*SCHOOL_OF_RE, &*NAMED_SCHOOL_RE] {
        for m in re.find_iter(text) {
            let school = m.as_str().trim();
            if school.len() > 2
                && school.len() < 100
                && !existing.iter().any(|e| e.contains(school))
            {
                existing.push(format!("Education at {}", school));
            }
            if existing.len() >= MAX_MINED_EDUCATION {
                return;
            }
        }
    }
    if existing.is_empty() {
        if let Some(m) = DEGREE_PHRASE_RE.find(text) {
            existing.push(m.as_str().trim().to_string());
        }
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Parse one page of profile markup into a record. Never fails: unresolved
/// fields come back empty and the name degrades to [`PLACEHOLDER_NAME`].
pub fn extract_profile(html: &str, url: &str) -> ProfileRecord {
    let doc = Html::parse_document(html);

    let name = extract_name(&doc);
    let mut record = ProfileRecord {
        name: if name.is_empty() { PLACEHOLDER_NAME.to_string() } else { name },
        headline: extract_headline(&doc),
        about: extract_about(&doc),
        experience: extract_experience(&doc),
        education: extract_education(&doc),
        skills: extract_skills(&doc),
        website: extract_website(&doc),
        profile_url: url.to_string(),
    };

    if record.experience.is_empty() || record.education.is_empty() {
        let text = visible_text(&doc);
        if record.experience.is_empty() {
            mine_experience_from_text(&text, &mut record.experience);
        }
        if record.education.is_empty() {
            mine_education_from_text(&text, &mut record.education);
        }
        record.experience.truncate(MAX_MINED_EXPERIENCE);
        record.education.truncate(MAX_MINED_EDUCATION);
    }

    tracing::debug!(
        name = %record.name,
        experience = record.experience.len(),
        education = record.education.len(),
        skills = record.skills.len(),
        "extracted profile"
    );
    record
}

/// How profile pages are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Plain HTTP GET. Misses script-rendered sections.
    Static,
    /// Headless Chrome render, for markup the site builds client-side.
    Browser,
}

impl FetchMode {
    pub fn parse_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "browser" | "chrome" => FetchMode::Browser,
            _ => FetchMode::Static,
        }
    }
}

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

pub struct PageFetcher {
    mode: FetchMode,
    client: reqwest::Client,
}

impl PageFetcher {
    pub fn new(mode: FetchMode) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { mode, client })
    }

    pub async fn fetch(&self, url: &str) -> Result<String> {
        match self.mode {
            FetchMode::Static => self.fetch_static(url).await,
            FetchMode::Browser => fetch_rendered(url),
        }
    }

    async fn fetch_static(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await?;
        Ok(resp.text().await?)
    }
}

/// Fetch the rendered DOM through headless Chrome.
fn fetch_rendered(url: &str) -> Result<String> {
    use headless_chrome::{Browser, LaunchOptions};

    let args = vec![
        std::ffi::OsStr::new("--disable-blink-features=AutomationControlled"),
        std::ffi::OsStr::new("--no-sandbox"),
        std::ffi::OsStr::new("--disable-dev-shm-usage"),
        std::ffi::OsStr::new("--headless=new"),
    ];
    let browser = Browser::new(LaunchOptions {
        headless: true,
        window_size: Some((1920, 1080)),
        args,
        ..Default::default()
    })?;
    let tab = browser.new_tab()?;
    tab.navigate_to(url)?;
    tab.wait_until_navigated()?;
    Ok(tab.get_content()?)
}

/// Fetch and extract with retries, tolerating pages that render their content
/// asynchronously. Re-fetches while the name resolves to the placeholder, up
/// to 5 attempts with a fixed 1-second delay, then returns whatever the last
/// attempt produced.
pub async fn extract_with_retry(fetcher: &PageFetcher, url: &str) -> ProfileRecord {
    let mut record = ProfileRecord::placeholder(url);
    for attempt in 1..=RETRY_ATTEMPTS {
        match fetcher.fetch(url).await {
            Ok(html) => {
                record = extract_profile(&html, url);
                if !record.is_placeholder() {
                    tracing::info!(attempt, "scraped profile for {}", record.name);
                    return record;
                }
            }
            Err(e) => {
                tracing::warn!(attempt, "profile fetch failed: {}", e);
            }
        }
        if attempt < RETRY_ATTEMPTS {
            tracing::debug!(attempt, "name unresolved, waiting for page to settle");
            sleep(RETRY_DELAY).await;
        }
    }
    tracing::warn!("could not resolve a profile name after {} attempts", RETRY_ATTEMPTS);
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE_HTML: &str = r#"<html>
      <head><title>Jane Doe | LinkedIn</title></head>
      <body>
        <h1 class="text-heading-xlarge">Jane Doe</h1>
        <div class="text-body-medium break-words">Data Scientist at Initech</div>
        <section class="artdeco-card pv-profile-card">
          <div id="about"></div>
          <div class="display-flex full-width">I turn messy data into decisions.</div>
        </section>
        <section>
          <div id="experience"></div>
          <ul>
            <li class="artdeco-list__item">
              <span class="mr1 hoverable-link-text t-bold"><span aria-hidden="true">Data Scientist</span></span>
              <span aria-hidden="true">Initech · Full-time</span>
              <span aria-hidden="true">Jan 2021 - Present · 3 yrs</span>
            </li>
            <li class="artdeco-list__item">
              <span class="mr1 hoverable-link-text t-bold"><span aria-hidden="true">Business Analyst</span></span>
              <span aria-hidden="true">Globex Corp</span>
            </li>
          </ul>
        </section>
        <section>
          <div id="education"></div>
          <ul>
            <li class="artdeco-list__item">
              <span class="mr1 hoverable-link-text t-bold"><span aria-hidden="true">State University</span></span>
              <span aria-hidden="true">Bachelor of Science, Statistics</span>
            </li>
          </ul>
        </section>
        <section>
          <div id="skills"></div>
          <ul>
            <li class="pvs-list__paged-list-item"><span aria-hidden="true">SQL</span></li>
            <li class="pvs-list__paged-list-item"><span aria-hidden="true">Python</span></li>
          </ul>
        </section>
        <a href="https://janedoe.com">my site</a>
      </body>
    </html>"#;

    #[test]
    fn test_full_profile_extraction() {
        let record = extract_profile(PROFILE_HTML, "https://www.linkedin.com/in/jane-doe/");
        assert_eq!(record.name, "Jane Doe");
        assert_eq!(record.headline, "Data Scientist at Initech");
        assert_eq!(record.about, "I turn messy data into decisions.");
        assert_eq!(record.experience[0], "Data Scientist at Initech");
        assert_eq!(record.experience[1], "Business Analyst at Globex Corp");
        assert_eq!(record.education[0], "Bachelor of Science, Statistics from State University");
        assert_eq!(record.skills, vec!["SQL", "Python"]);
        assert_eq!(record.website.as_deref(), Some("https://janedoe.com"));
    }

    #[test]
    fn test_name_never_empty() {
        let record = extract_profile("<html><body></body></html>", "https://example.com");
        assert_eq!(record.name, PLACEHOLDER_NAME);
        assert!(!record.name.is_empty());
    }

    #[test]
    fn test_name_from_page_title() {
        let html = "<html><head><title>John Smith | LinkedIn</title></head><body></body></html>";
        let record = extract_profile(html, "https://www.linkedin.com/in/john");
        assert_eq!(record.name, "John Smith");
    }

    #[test]
    fn test_date_rows_not_read_as_titles() {
        let html = r#"<html><body>
          <section><div id="experience"></div><ul>
            <li class="artdeco-list__item">
              <span aria-hidden="true">Jan 2020 - Dec 2022</span>
              <span aria-hidden="true">2 yrs</span>
            </li>
          </ul></section>
        </body></html>"#;
        let record = extract_profile(html, "https://www.linkedin.com/in/x");
        assert!(record.experience.iter().all(|e| !e.contains("2020")));
    }

    #[test]
    fn test_text_mining_fallback_finds_company() {
        let html = r#"<html><body>
          <h1>Sam Lee</h1>
          <p>Spent five years at Google building search infrastructure.</p>
        </body></html>"#;
        let record = extract_profile(html, "https://www.linkedin.com/in/sam");
        assert!(record.experience.iter().any(|e| e.contains("Google")), "{:?}", record.experience);
    }

    #[test]
    fn test_script_text_not_mined() {
        let html = r#"<html><body>
          <h1>Sam Lee</h1>
          <script>var x = "at Google";</script>
        </body></html>"#;
        let record = extract_profile(html, "https://www.linkedin.com/in/sam");
        assert!(record.experience.is_empty(), "{:?}", record.experience);
    }

    #[test]
    fn test_is_profile_url() {
        assert!(is_profile_url("https://www.linkedin.com/in/jane-doe/"));
        assert!(!is_profile_url("https://www.linkedin.com/feed/"));
        assert!(!is_profile_url("https://example.com/in/jane"));
        assert!(!is_profile_url("not a url"));
    }

    #[test]
    fn test_redundant_title_company_collapsed() {
        let html = r#"<html><body>
          <section><div id="experience"></div><ul>
            <li class="artdeco-list__item">
              <span class="mr1 hoverable-link-text t-bold"><span aria-hidden="true">HubSpot</span></span>
            </li>
          </ul></section>
        </body></html>"#;
        let record = extract_profile(html, "https://www.linkedin.com/in/x");
        assert_eq!(record.experience[0], "Work at HubSpot");
    }
}
