//! Response generation: remote completion first, pattern-matched templates on
//! any failure.
//!
//! The fallback decision tree consults data-driven tables (topic keyword
//! groups, company insights, style guides) rather than inline branching, so
//! the site-coupled vocabulary can be swapped out from a JSON file without
//! touching the matching logic.

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::completion::{ApiMessage, CompletionClient, CompletionError};
use crate::extractor::ProfileRecord;
use crate::persona::{self, MergedPersona, PersonaConfig, ResponseStyle};
use crate::session::{ChatMessage, Sender};
use crate::store::{JsonStore, KEY_API_KEY, KEY_PERSONALITY};

/// Shown only when even the template fallback produces nothing.
pub const TROUBLE_MESSAGE: &str = "Sorry, I had trouble responding. Please try again.";

const HISTORY_CONTEXT: usize = 10;
const MAX_RESPONSE_TOKENS: u32 = 150;
const TEMPERATURE: f32 = 0.7;

// ============================================================================
// Lookup tables
// ============================================================================

/// Canned inference text for one role at a known employer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleInsight {
    pub role: String,
    pub insight: String,
}

/// What can be reasonably said about working at a known employer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyInsight {
    pub company: String,
    pub general: String,
    #[serde(default)]
    pub roles: Vec<RoleInsight>,
    /// Extra sentence for skills questions when this employer appears in the
    /// scraped experience.
    #[serde(default)]
    pub skill_riff: Option<String>,
}

/// Keyword groups tested in fixed priority order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicKeywords {
    pub experience: Vec<String>,
    pub skills: Vec<String>,
    pub goals: Vec<String>,
    pub contact: Vec<String>,
    pub website: Vec<String>,
    pub interests: Vec<String>,
    pub education: Vec<String>,
    pub about: Vec<String>,
}

impl Default for TopicKeywords {
    fn default() -> Self {
        let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            experience: list(&["experience", "work", "job"]),
            skills: list(&["skills", "expertise", "technologies"]),
            goals: list(&["goals", "aspiration", "future"]),
            contact: list(&["contact", "reach", "connect", "website", "portfolio"]),
            website: list(&["website", "portfolio"]),
            interests: list(&["interests", "hobbies", "outside work"]),
            education: list(&["education", "school", "study"]),
            about: list(&["about", "tell me", "yourself"]),
        }
    }
}

/// Per-style prompt guidance and generic acknowledgements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleEntry {
    pub style: ResponseStyle,
    pub guide: String,
    pub defaults: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseTables {
    pub company_question_triggers: Vec<String>,
    pub internal_topic_triggers: Vec<String>,
    pub topic_keywords: TopicKeywords,
    pub data_role_markers: Vec<String>,
    pub company_insights: Vec<CompanyInsight>,
    pub styles: Vec<StyleEntry>,
}

impl ResponseTables {
    /// Built-in tables, or the JSON file at `path` when given and readable.
    pub fn load(path: Option<&str>) -> Self {
        let Some(path) = path else { return Self::default() };
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(tables) => {
                    tracing::info!("loaded response tables from {}", path);
                    tables
                }
                Err(e) => {
                    tracing::warn!("response tables file {} is invalid ({}), using built-ins", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("could not read response tables {} ({}), using built-ins", path, e);
                Self::default()
            }
        }
    }

    fn style_entry(&self, style: ResponseStyle) -> Option<&StyleEntry> {
        self.styles
            .iter()
            .find(|s| s.style == style)
            .or_else(|| self.styles.iter().find(|s| s.style == ResponseStyle::Friendly))
    }

    fn company_mentioned(&self, message: &str) -> Option<&CompanyInsight> {
        self.company_insights
            .iter()
            .find(|ci| message.contains(&ci.company.to_lowercase()))
    }
}

impl Default for ResponseTables {
    fn default() -> Self {
        let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let role = |r: &str, i: &str| RoleInsight { role: r.to_string(), insight: i.to_string() };

        Self {
            company_question_triggers: list(&[
                "experience at",
                "what did you do at",
                "work at",
                "time at",
            ]),
            internal_topic_triggers: list(&[
                "team", "manager", "colleagues", "internal", "specific project", "meetings",
                "processes", "calendly", "calendar", "schedule", "coffee chat",
            ]),
            topic_keywords: TopicKeywords::default(),
            data_role_markers: list(&["data scientist", "business analyst", "business intelligence"]),
            company_insights: vec![
                CompanyInsight {
                    company: "Amazon".to_string(),
                    general: "found that Amazon's scale and data infrastructure provided incredible learning opportunities".to_string(),
                    roles: vec![
                        role("data scientist", "worked with massive datasets, likely focusing on customer behavior, recommendation systems, or operational optimization"),
                        role("business analyst", "analyzed business metrics, supported decision-making with data insights, and worked on process improvements"),
                        role("business intelligence", "built dashboards, automated reporting systems, and worked with data warehousing solutions"),
                    ],
                    skill_riff: Some("Having worked at Amazon, I'm familiar with large-scale data systems and cloud technologies.".to_string()),
                },
                CompanyInsight {
                    company: "LinkedIn".to_string(),
                    general: "worked on a professional network platform focused on career development and networking".to_string(),
                    roles: vec![
                        role("software engineer", "worked on platform features, likely involving distributed systems, recommendation algorithms, or user experience"),
                        role("intern", "gained experience with large-scale systems and professional networking technology"),
                        role("data scientist", "analyzed user behavior, professional connections, and platform engagement metrics"),
                    ],
                    skill_riff: None,
                },
                CompanyInsight {
                    company: "Google".to_string(),
                    general: "experienced an innovative culture with cutting-edge technology across search, cloud, and AI".to_string(),
                    roles: vec![
                        role("software engineer", "worked on scalable systems, search algorithms, or cloud infrastructure"),
                        role("intern", "experienced the engineering culture and contributed to products used by billions"),
                        role("data scientist", "analyzed user data, search patterns, or product metrics at massive scale"),
                    ],
                    skill_riff: None,
                },
                CompanyInsight {
                    company: "Instagram".to_string(),
                    general: "worked where the focus on visual content and user engagement created unique data challenges".to_string(),
                    roles: vec![
                        role("data scientist", "likely worked on engagement algorithms, content ranking, user growth, or creator economy initiatives"),
                        role("data analyst", "analyzed user behavior, content performance, and platform metrics"),
                    ],
                    skill_riff: Some("My experience at Meta/Instagram involved working with massive user datasets and engagement metrics.".to_string()),
                },
                CompanyInsight {
                    company: "Meta".to_string(),
                    general: "worked on the mission to connect people globally through various platforms".to_string(),
                    roles: vec![
                        role("data scientist", "probably worked on user engagement, advertising optimization, or platform growth initiatives"),
                    ],
                    skill_riff: Some("My experience at Meta/Instagram involved working with massive user datasets and engagement metrics.".to_string()),
                },
                CompanyInsight {
                    company: "ClassDojo".to_string(),
                    general: "supported the mission to connect classrooms and improve student learning".to_string(),
                    roles: vec![
                        role("data scientist", "likely focused on educational outcomes, user engagement, and product features that support teachers and students"),
                    ],
                    skill_riff: None,
                },
                CompanyInsight {
                    company: "Patreon".to_string(),
                    general: "worked on a creator economy platform connecting creators with their supporters".to_string(),
                    roles: vec![
                        role("data scientist", "probably worked on creator success metrics, subscription optimization, and platform growth"),
                    ],
                    skill_riff: None,
                },
                CompanyInsight {
                    company: "HubSpot".to_string(),
                    general: "worked on an inbound marketing, sales, and customer service platform".to_string(),
                    roles: vec![
                        role("software engineer", "worked on CRM features, marketing automation, or sales tools"),
                        role("recruiter", "focused on talent acquisition and building engineering teams"),
                    ],
                    skill_riff: None,
                },
            ],
            styles: vec![
                StyleEntry {
                    style: ResponseStyle::Friendly,
                    guide: "Respond in a warm, approachable manner. Use friendly language and show genuine interest in connecting.".to_string(),
                    defaults: list(&[
                        "That's a great question! I'd be happy to share what I know about that.",
                        "Thanks for asking! I enjoy discussing my professional background and experiences.",
                        "I appreciate your interest. What specific aspect would you like to know more about?",
                        "Great to connect with you! I can share insights from my professional journey, though as a digital twin, I'm limited to public information.",
                    ]),
                },
                StyleEntry {
                    style: ResponseStyle::Professional,
                    guide: "Maintain a formal, business-appropriate tone. Be polite and professional in all responses.".to_string(),
                    defaults: list(&[
                        "I would be pleased to provide information on that topic based on my professional background.",
                        "Thank you for your inquiry. I am happy to discuss what's publicly available about my experience.",
                        "That is an excellent question. I would welcome the opportunity to share what I know.",
                        "I appreciate your interest and would be glad to share my perspective, though as a digital twin, my knowledge is limited to public information.",
                    ]),
                },
                StyleEntry {
                    style: ResponseStyle::Casual,
                    guide: "Use a relaxed, informal tone. Feel free to use contractions and casual language.".to_string(),
                    defaults: list(&[
                        "Good question! I'd love to chat more about that if I have info on it.",
                        "Hey, thanks for asking! I'll share what I know about that topic.",
                        "Totally! I'd be happy to discuss that based on my public background.",
                        "Nice question! Though as a digital twin, I might not have all the details you're looking for.",
                    ]),
                },
                StyleEntry {
                    style: ResponseStyle::Enthusiastic,
                    guide: "Show excitement and passion in your responses. Use exclamation points and energetic language when appropriate.".to_string(),
                    defaults: list(&[
                        "That's such an exciting question! I'm thrilled to share what I know about that!",
                        "I love talking about my professional journey! Thanks for asking!",
                        "What a fantastic question! I'm passionate about discussing my background and experience!",
                        "This is great! I'd love to tell you more, though I should mention I'm a digital twin with limited knowledge.",
                    ]),
                },
                StyleEntry {
                    style: ResponseStyle::Thoughtful,
                    guide: "Provide thoughtful, well-considered responses. Show depth in your thinking and analysis.".to_string(),
                    defaults: list(&[
                        "That's a thoughtful question. I'll share what I know from my professional experience.",
                        "I find that topic fascinating. Let me share what's available from my public background.",
                        "That's an interesting perspective. I can discuss this based on my publicly available information.",
                        "I appreciate the depth of your question. As a digital twin, I'll be honest about what I do and don't know.",
                    ]),
                },
            ],
        }
    }
}

// ============================================================================
// Generation
// ============================================================================

pub struct Responder {
    tables: ResponseTables,
    client: CompletionClient,
}

fn contains_any(message: &str, keys: &[String]) -> bool {
    keys.iter().any(|k| message.contains(k.as_str()))
}

fn truncate_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

fn apply_style(style: ResponseStyle, text: &str) -> String {
    match style {
        ResponseStyle::Enthusiastic => {
            if !text.contains('!') {
                if let Some(stripped) = text.strip_suffix('.') {
                    return format!("{}!", stripped);
                }
            }
            text.to_string()
        }
        ResponseStyle::Casual => match text.strip_prefix("I am ") {
            Some(rest) => format!("I'm {}", rest),
            None => text.to_string(),
        },
        ResponseStyle::Thoughtful => {
            if !text.contains("I believe") && !text.contains("In my experience") {
                let mut chars = text.chars();
                if let Some(first) = chars.next() {
                    return format!("In my experience, {}{}", first.to_lowercase(), chars.as_str());
                }
            }
            text.to_string()
        }
        ResponseStyle::Friendly | ResponseStyle::Professional => text.to_string(),
    }
}

fn companies_from_experience(record: &ProfileRecord) -> String {
    let companies: Vec<&str> = record
        .experience
        .iter()
        .take(3)
        .filter_map(|e| e.split(" at ").nth(1))
        .collect();
    if companies.is_empty() {
        "various companies".to_string()
    } else {
        companies.join(", ")
    }
}

impl Responder {
    pub fn new(tables: ResponseTables, client: CompletionClient) -> Self {
        Self { tables, client }
    }

    /// Produce the bot reply for one user message. Credential and persona
    /// config are re-read from the store on every call so edits take effect
    /// immediately; every remote failure degrades silently to the template
    /// fallback.
    pub async fn generate(
        &self,
        store: &JsonStore,
        record: &ProfileRecord,
        history: &[ChatMessage],
        user_message: &str,
    ) -> String {
        let api_key: Option<String> = store.get(KEY_API_KEY).await;
        let config: Option<PersonaConfig> = store.get(KEY_PERSONALITY).await;
        let merged = persona::merge(record.clone(), config.as_ref());

        if let Some(key) = api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            match self.remote_response(key, &merged, history, user_message).await {
                Ok(text) => return text,
                Err(e) => {
                    tracing::warn!("completion call failed, using pattern fallback: {}", e);
                }
            }
        } else {
            tracing::debug!("no API credential stored, using pattern fallback");
        }

        match self.fallback_response(&merged, user_message) {
            Some(text) => text,
            None => {
                tracing::error!("no fallback response available for the configured style");
                TROUBLE_MESSAGE.to_string()
            }
        }
    }

    /// Verify the stored credential against the completion endpoint.
    pub async fn test_credential(&self, store: &JsonStore) -> (bool, String) {
        let api_key: Option<String> = store.get(KEY_API_KEY).await;
        match api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            Some(key) => self.client.test_connection(key).await,
            None => (false, "Please enter an API key first".to_string()),
        }
    }

    /// Session-start greeting; derived, never persisted.
    pub fn welcome_message(&self, merged: &MergedPersona) -> String {
        let headline_note = if merged.record.headline.is_empty() {
            String::new()
        } else {
            format!("I'm {}. ", merged.record.headline.to_lowercase())
        };
        format!(
            "Hi! I'm {}'s digital twin - an AI version of them based on their public profile. {}I can share what's publicly known about my background and experience, but I'm honest about what I don't know. What would you like to chat about?",
            merged.record.name, headline_note
        )
    }

    async fn remote_response(
        &self,
        api_key: &str,
        merged: &MergedPersona,
        history: &[ChatMessage],
        user_message: &str,
    ) -> Result<String, CompletionError> {
        let mut messages = vec![ApiMessage::system(self.build_system_prompt(merged))];
        for msg in history.iter().skip(history.len().saturating_sub(HISTORY_CONTEXT)) {
            messages.push(match msg.sender {
                Sender::User => ApiMessage::user(msg.text.clone()),
                Sender::Bot => ApiMessage::assistant(msg.text.clone()),
            });
        }
        messages.push(ApiMessage::user(user_message));

        self.client
            .complete(api_key, messages, MAX_RESPONSE_TOKENS, TEMPERATURE)
            .await
    }

    fn build_system_prompt(&self, merged: &MergedPersona) -> String {
        let record = &merged.record;
        let mut prompt = format!("You are {}", record.name);
        if !record.headline.is_empty() {
            prompt.push_str(&format!(", {}", record.headline));
        }
        prompt.push_str(". You are responding to someone who is viewing your profile and wants to chat with you.");

        if !record.about.is_empty() {
            prompt.push_str(&format!("\n\nAbout me: {}", record.about));
        }
        if !record.experience.is_empty() {
            let recent: Vec<_> = record.experience.iter().take(3).cloned().collect();
            prompt.push_str(&format!("\n\nMy recent experience: {}", recent.join(", ")));
        }
        if !record.education.is_empty() {
            let education: Vec<_> = record.education.iter().take(2).cloned().collect();
            prompt.push_str(&format!("\n\nMy education: {}", education.join(", ")));
        }
        if !record.skills.is_empty() {
            let skills: Vec<_> = record.skills.iter().take(6).cloned().collect();
            prompt.push_str(&format!("\n\nMy skills: {}", skills.join(", ")));
        }
        if let Some(site) = &record.website {
            prompt.push_str(&format!("\n\nMy website: {}", site));
        }

        if let Some(custom) = &merged.custom {
            if custom.has_custom_bio {
                prompt.push_str("\n\nPersonal context: This bio represents my personalized introduction, while my experience and skills are kept current from my profile.");
            }
            if let Some(entry) = self.tables.style_entry(custom.response_style) {
                prompt.push_str(&format!("\n\n{}", entry.guide));
            }
            let topics = &custom.topic_responses;
            for (label, text) in [
                ("work experience", &topics.work),
                ("skills", &topics.skills),
                ("goals", &topics.goals),
                ("contact", &topics.contact),
                ("interests", &topics.interests),
            ] {
                if !text.trim().is_empty() {
                    prompt.push_str(&format!("\n\nIf asked about {}: {}", label, text));
                }
            }
            if !custom.custom_responses.is_empty() {
                prompt.push_str("\n\nCustom responses:");
                for cr in &custom.custom_responses {
                    prompt.push_str(&format!("\n- If asked \"{}\": {}", cr.question, cr.answer));
                }
            }
            prompt.push_str("\n\nIMPORTANT: You have access to both my personalized responses above AND my current experience/education/skills data. Use the custom responses for personality and style, but feel free to reference my actual current work experience and skills from the profile data.");
        }

        prompt.push_str(&format!(
            "\n\nYou are {}'s digital twin - an AI version of them. Speak in first person as if you ARE {}, but be transparent about your nature and limitations.",
            record.name, record.name
        ));
        prompt.push_str("\n\nYou can make REASONABLE INFERENCES about my work based on:");
        prompt.push_str("\n- Standard responsibilities for my job titles");
        prompt.push_str("\n- General knowledge about the companies I've worked at and their business models");
        prompt.push_str("\n- Typical technologies and methodologies used in my roles");
        prompt.push_str("\n- Common career progression and skill development in my field");
        prompt.push_str("\n\nWhen making inferences, use phrases like \"typically,\" \"generally,\" or \"in my role as [title], I would have...\" Be honest when you're inferring vs. stating facts.");
        prompt.push_str("\n\nDO NOT make up specific details about:");
        prompt.push_str("\n- Exact project names, team members, or internal processes");
        prompt.push_str("\n- Specific metrics, numbers, or confidential business information");
        prompt.push_str("\n- Personal opinions on company decisions or internal politics");
        prompt.push_str("\n- Precise technical implementations or proprietary methodologies");
        prompt.push_str("\n\nFor very specific questions beyond reasonable inference, direct them to message the real me: \"For those specific details, I'd recommend reaching out to me directly - I'd be happy to share more!\"");
        prompt.push_str("\n\nRespond naturally and conversationally in first person. Keep responses under 150 words. Be knowledgeable but honest about your limitations as a digital twin.");
        prompt
    }

    /// The template decision tree: first hit wins, in fixed priority order.
    fn fallback_response(&self, merged: &MergedPersona, user_message: &str) -> Option<String> {
        let m = user_message.to_lowercase();
        let record = &merged.record;
        let t = &self.tables;

        // Custom (trigger, answer) pairs come first, own profile only.
        if let Some(custom) = &merged.custom {
            for cr in &custom.custom_responses {
                if m.contains(&cr.question.to_lowercase()) {
                    return Some(apply_style(custom.response_style, &cr.answer));
                }
            }
        }

        // Questions about a specific employer.
        if contains_any(&m, &t.company_question_triggers) {
            if let Some(insight) = t.company_mentioned(&m) {
                let needle = insight.company.to_lowercase();
                if let Some(entry) =
                    record.experience.iter().find(|e| e.to_lowercase().contains(&needle))
                {
                    return Some(self.company_response(entry, insight));
                }
            }
            return Some(
                "I've had some great experiences across different companies! Based on my public profile, I can share general insights about my roles. For specific details about day-to-day work or particular projects, feel free to message me directly!"
                    .to_string(),
            );
        }

        // Internal/confidential topics are deflected, never guessed at.
        if contains_any(&m, &t.internal_topic_triggers) {
            return Some(
                "For those specific details about team dynamics, internal processes, or scheduling, I'd recommend reaching out to me directly - I'd be happy to share more and potentially set up a chat!"
                    .to_string(),
            );
        }

        if contains_any(&m, &t.topic_keywords.experience) {
            return Some(self.experience_response(merged));
        }
        if contains_any(&m, &t.topic_keywords.skills) {
            return Some(self.skills_response(merged));
        }
        if contains_any(&m, &t.topic_keywords.goals) {
            if let Some(text) = topic_override(merged, |topics| &topics.goals) {
                return Some(text);
            }
            return Some(
                "I'm always looking for new opportunities to grow professionally and make a meaningful impact in my field."
                    .to_string(),
            );
        }
        if contains_any(&m, &t.topic_keywords.contact) {
            if let Some(text) = topic_override(merged, |topics| &topics.contact) {
                return Some(text);
            }
            if contains_any(&m, &t.topic_keywords.website) {
                if let Some(site) = &record.website {
                    return Some(format!(
                        "You can check out my website at {}! Feel free to also connect with me here for direct conversations.",
                        site
                    ));
                }
            }
            return Some(
                "Feel free to connect with me! I'm always open to networking and professional conversations. You can also message me directly if you'd like to discuss specific opportunities or projects."
                    .to_string(),
            );
        }
        if contains_any(&m, &t.topic_keywords.interests) {
            if let Some(text) = topic_override(merged, |topics| &topics.interests) {
                return Some(text);
            }
            return Some(
                "I have diverse interests outside of work that help me maintain a good work-life balance and bring fresh perspectives to my professional life."
                    .to_string(),
            );
        }
        if contains_any(&m, &t.topic_keywords.education) {
            if let Some(first) = record.education.first() {
                return Some(format!(
                    "I studied {}. Education has been important in shaping my career path.",
                    first
                ));
            }
            return Some("I believe in continuous learning and professional development.".to_string());
        }
        if contains_any(&m, &t.topic_keywords.about) {
            return Some(self.about_response(merged));
        }

        self.default_response(merged)
    }

    fn company_response(&self, experience_entry: &str, insight: &CompanyInsight) -> String {
        let job_title = experience_entry.split(" at ").next().unwrap_or(experience_entry);
        let mut response =
            format!("In my role as {} at {}, I {}. ", job_title, insight.company, insight.general);

        let normalized_title: String =
            job_title.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect();
        for role in &insight.roles {
            let normalized_role: String =
                role.role.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect();
            if normalized_title.contains(&normalized_role) {
                response.push_str(&format!("Generally, I {}. ", role.insight));
                break;
            }
        }

        response.push_str("For specific project details or deeper insights about my experience there, feel free to reach out directly!");
        response
    }

    fn experience_response(&self, merged: &MergedPersona) -> String {
        if let Some(text) = topic_override(merged, |topics| &topics.work) {
            return text;
        }

        let record = &merged.record;
        if record.experience.is_empty() {
            let headline_note = if record.headline.is_empty() {
                String::new()
            } else {
                format!("Currently, I'm {}. ", record.headline.to_lowercase())
            };
            return format!(
                "I'm always growing my professional experience. {}For specific details about my projects and work, please message me directly and I'll be happy to share more!",
                headline_note
            );
        }

        let has_data_roles = record.experience.iter().any(|e| {
            let lower = e.to_lowercase();
            self.tables.data_role_markers.iter().any(|mk| lower.contains(mk))
        });

        let mut response = if has_data_roles {
            let mut r = format!(
                "I've built my career in data science and analytics, working at companies like {}. ",
                companies_from_experience(record)
            );
            r.push_str("In my data roles, I typically work with large datasets, build predictive models, create insights for business decisions, and collaborate with cross-functional teams. ");
            if record.experience.iter().any(|e| e.contains("Co-Founder")) {
                r.push_str("I'm also entrepreneurial and currently building a venture of my own. ");
            }
            r
        } else {
            let first_two: Vec<_> = record.experience.iter().take(2).cloned().collect();
            format!("I have experience across {}. ", first_two.join(" and "))
        };

        if merged.custom.as_ref().is_some_and(|c| c.has_custom_bio) {
            response.push_str("My bio gives you my personal perspective, while my experience above reflects my current profile. ");
        }
        if !record.about.is_empty() {
            response.push_str(&format!("{}... ", truncate_chars(&record.about, 100)));
        }
        response.push_str("For specific project details or deeper insights, feel free to message me directly!");
        response
    }

    fn skills_response(&self, merged: &MergedPersona) -> String {
        if let Some(text) = topic_override(merged, |topics| &topics.skills) {
            return text;
        }

        let record = &merged.record;
        let has_data_roles = record.experience.iter().any(|e| {
            let lower = e.to_lowercase();
            self.tables.data_role_markers.iter().any(|mk| lower.contains(mk))
        });

        let mut response = if has_data_roles {
            let mut r = String::from(
                "As a data professional, my skillset typically includes programming languages like Python and SQL, statistical analysis, machine learning, data visualization, and business intelligence tools. ",
            );
            for insight in &self.tables.company_insights {
                let Some(riff) = &insight.skill_riff else { continue };
                let needle = insight.company.to_lowercase();
                if record.experience.iter().any(|e| e.to_lowercase().contains(&needle)) {
                    r.push_str(riff);
                    r.push(' ');
                }
            }
            if !record.skills.is_empty() {
                let skills: Vec<_> = record.skills.iter().take(4).cloned().collect();
                r.push_str(&format!("My current listed skills include {}. ", skills.join(", ")));
            }
            if merged.is_own_profile {
                r.push_str("These skills are kept current on my profile. ");
            }
            r
        } else if !record.skills.is_empty() {
            let skills: Vec<_> = record.skills.iter().take(4).cloned().collect();
            let mut r = format!("My skills include {}. ", skills.join(", "));
            if !record.headline.is_empty() {
                r.push_str(&format!(
                    "My expertise is primarily in {}. ",
                    record.headline.to_lowercase()
                ));
            }
            if merged.is_own_profile {
                r.push_str("These are current from my profile. ");
            }
            r
        } else if !record.headline.is_empty() {
            format!("My expertise is in {}. ", record.headline.to_lowercase())
        } else {
            String::from("I have a diverse set of professional skills that I've developed throughout my career. ")
        };

        response.push_str("For a deeper technical discussion or specific tool experience, feel free to message me!");
        response
    }

    fn about_response(&self, merged: &MergedPersona) -> String {
        if let Some(custom) = &merged.custom {
            if custom.has_custom_bio {
                return apply_style(custom.response_style, &merged.record.about);
            }
        }

        let record = &merged.record;
        let mut response = format!("I'm {}", record.name);
        if !record.headline.is_empty() {
            response.push_str(&format!(", {}", record.headline.to_lowercase()));
        }
        if !record.about.is_empty() {
            response.push_str(&format!(". {}", truncate_chars(&record.about, 150)));
        }
        if response.len() < 50 {
            response.push_str(". I'm passionate about my work and connecting with professionals like yourself.");
        }
        response
    }

    fn default_response(&self, merged: &MergedPersona) -> Option<String> {
        let style = merged
            .custom
            .as_ref()
            .map(|c| c.response_style)
            .unwrap_or(ResponseStyle::Friendly);
        let entry = self.tables.style_entry(style)?;
        entry.defaults.choose(&mut rand::thread_rng()).cloned()
    }
}

fn topic_override(
    merged: &MergedPersona,
    pick: impl Fn(&crate::persona::TopicResponses) -> &String,
) -> Option<String> {
    let custom = merged.custom.as_ref()?;
    let text = pick(&custom.topic_responses);
    if text.trim().is_empty() {
        None
    } else {
        Some(apply_style(custom.response_style, text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persona::{CustomPersonality, CustomResponse, TopicResponses};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn responder() -> Responder {
        Responder::new(
            ResponseTables::default(),
            CompletionClient::new("http://127.0.0.1:9".to_string(), "gpt-4o".to_string()),
        )
    }

    fn scraped(record: ProfileRecord) -> MergedPersona {
        MergedPersona { record, is_own_profile: false, custom: None }
    }

    fn own(record: ProfileRecord, style: ResponseStyle) -> MergedPersona {
        MergedPersona {
            record,
            is_own_profile: true,
            custom: Some(CustomPersonality {
                has_custom_bio: false,
                response_style: style,
                topic_responses: TopicResponses::default(),
                custom_responses: vec![CustomResponse {
                    question: "management style".to_string(),
                    answer: "I am a believer in collaborative leadership.".to_string(),
                }],
            }),
        }
    }

    fn data_record() -> ProfileRecord {
        ProfileRecord {
            name: "Jane Doe".to_string(),
            headline: "Data Scientist".to_string(),
            experience: vec!["Data Scientist at Amazon".to_string()],
            skills: vec!["SQL".to_string(), "Python".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_custom_trigger_wins_and_is_styled() {
        let r = responder();
        let merged = own(data_record(), ResponseStyle::Casual);
        let out = r.fallback_response(&merged, "What's your management style?").unwrap();
        assert_eq!(out, "I'm a believer in collaborative leadership.");
    }

    #[test]
    fn test_company_question_uses_insight_table() {
        let r = responder();
        let merged = scraped(data_record());
        let out = r.fallback_response(&merged, "What did you do at Amazon?").unwrap();
        assert!(out.contains("In my role as Data Scientist at Amazon"), "{}", out);
        assert!(out.contains("massive datasets"), "{}", out);
    }

    #[test]
    fn test_internal_topics_deflected() {
        let r = responder();
        let merged = scraped(data_record());
        let out = r.fallback_response(&merged, "Who was your manager there?").unwrap();
        assert!(out.contains("reaching out to me directly"), "{}", out);
    }

    #[test]
    fn test_skills_answer_lists_scraped_skills() {
        let r = responder();
        let record = ProfileRecord {
            name: "Jane Doe".to_string(),
            skills: vec!["SQL".to_string(), "Python".to_string()],
            ..Default::default()
        };
        let out = r.fallback_response(&scraped(record), "what are your skills?").unwrap();
        assert!(out.contains("SQL"), "{}", out);
        assert!(out.contains("Python"), "{}", out);
    }

    #[test]
    fn test_education_answer_uses_first_entry() {
        let r = responder();
        let record = ProfileRecord {
            name: "Jane Doe".to_string(),
            education: vec!["BS in Statistics from State University".to_string()],
            ..Default::default()
        };
        let out = r.fallback_response(&scraped(record), "where did you study?").unwrap();
        assert!(out.contains("State University"), "{}", out);
    }

    #[test]
    fn test_unmatched_message_draws_from_style_defaults() {
        let r = responder();
        let merged = own(data_record(), ResponseStyle::Professional);
        let out = r.fallback_response(&merged, "xyzzy").unwrap();
        let table = ResponseTables::default();
        let entry = table.styles.iter().find(|s| s.style == ResponseStyle::Professional).unwrap();
        assert!(entry.defaults.contains(&out), "{}", out);
    }

    #[test]
    fn test_apply_style_variants() {
        assert_eq!(
            apply_style(ResponseStyle::Enthusiastic, "I enjoy my work."),
            "I enjoy my work!"
        );
        assert_eq!(apply_style(ResponseStyle::Casual, "I am an engineer."), "I'm an engineer.");
        assert_eq!(
            apply_style(ResponseStyle::Thoughtful, "Good teams ship."),
            "In my experience, good teams ship."
        );
        assert_eq!(apply_style(ResponseStyle::Professional, "As stated."), "As stated.");
    }

    #[tokio::test]
    async fn test_generate_without_credential_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("state.json"));
        let r = responder();
        let record = ProfileRecord {
            name: "Jane Doe".to_string(),
            skills: vec!["SQL".to_string(), "Python".to_string()],
            ..Default::default()
        };
        let out = r.generate(&store, &record, &[], "What are your skills?").await;
        assert!(out.contains("SQL") && out.contains("Python"), "{}", out);
    }

    #[tokio::test]
    async fn test_generate_falls_back_on_http_401() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("state.json"));
        store.set(KEY_API_KEY, &"valid-looking-key".to_string()).await.unwrap();

        let r = Responder::new(
            ResponseTables::default(),
            CompletionClient::new(server.uri(), "gpt-4o".to_string()),
        );
        let record = ProfileRecord {
            name: "Jane Doe".to_string(),
            skills: vec!["SQL".to_string(), "Python".to_string()],
            ..Default::default()
        };
        let out = r.generate(&store, &record, &[], "What are your skills?").await;
        assert!(out.contains("SQL") && out.contains("Python"), "{}", out);
        assert_ne!(out, TROUBLE_MESSAGE);
    }

    #[tokio::test]
    async fn test_generate_uses_remote_when_available() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Remote answer."}}]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("state.json"));
        store.set(KEY_API_KEY, &"valid-looking-key".to_string()).await.unwrap();

        let r = Responder::new(
            ResponseTables::default(),
            CompletionClient::new(server.uri(), "gpt-4o".to_string()),
        );
        let out = r.generate(&store, &data_record(), &[], "hello").await;
        assert_eq!(out, "Remote answer.");
    }

    #[test]
    fn test_system_prompt_carries_boundaries_and_facts() {
        let r = responder();
        let merged = scraped(data_record());
        let prompt = r.build_system_prompt(&merged);
        assert!(prompt.contains("You are Jane Doe"));
        assert!(prompt.contains("REASONABLE INFERENCES"));
        assert!(prompt.contains("DO NOT make up specific details"));
        assert!(prompt.contains("Data Scientist at Amazon"));
    }
}
