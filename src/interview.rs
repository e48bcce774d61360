//! Interview domain types shared by every subsystem.
//!
//! [`SessionConfig`] is the immutable handoff from the lobby screen: the
//! target role, experience level, interview style and optional resume text.
//! [`Question`], [`Turn`] and [`Answer`] are the values the dialogue
//! controller stores in its transcript.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Lobby selections
// ---------------------------------------------------------------------------

/// Target job role for the mock interview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    FrontendDev,
    BackendDev,
    FullstackDev,
    MlEngineer,
    DataScientist,
    Devops,
    CoreElectronics,
    ProductManager,
    MobileDev,
    QaEngineer,
}

impl Role {
    pub const ALL: &'static [Role] = &[
        Role::FrontendDev,
        Role::BackendDev,
        Role::FullstackDev,
        Role::MlEngineer,
        Role::DataScientist,
        Role::Devops,
        Role::CoreElectronics,
        Role::ProductManager,
        Role::MobileDev,
        Role::QaEngineer,
    ];

    /// Stable identifier used on the wire and on the command line.
    pub fn slug(&self) -> &'static str {
        match self {
            Role::FrontendDev => "frontend-dev",
            Role::BackendDev => "backend-dev",
            Role::FullstackDev => "fullstack-dev",
            Role::MlEngineer => "ml-engineer",
            Role::DataScientist => "data-scientist",
            Role::Devops => "devops",
            Role::CoreElectronics => "core-electronics",
            Role::ProductManager => "product-manager",
            Role::MobileDev => "mobile-dev",
            Role::QaEngineer => "qa-engineer",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::FrontendDev => "Frontend Developer",
            Role::BackendDev => "Backend Developer",
            Role::FullstackDev => "Full-Stack Developer",
            Role::MlEngineer => "ML Engineer",
            Role::DataScientist => "Data Scientist",
            Role::Devops => "DevOps Engineer",
            Role::CoreElectronics => "Core Electronics",
            Role::ProductManager => "Product Manager",
            Role::MobileDev => "Mobile Developer",
            Role::QaEngineer => "QA Engineer",
        }
    }
}

/// Years of experience bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExperienceLevel {
    #[serde(rename = "fresher")]
    Fresher,
    #[serde(rename = "1-3")]
    OneToThree,
    #[serde(rename = "3-5")]
    ThreeToFive,
    #[serde(rename = "5+")]
    FivePlus,
}

impl ExperienceLevel {
    pub const ALL: &'static [ExperienceLevel] = &[
        ExperienceLevel::Fresher,
        ExperienceLevel::OneToThree,
        ExperienceLevel::ThreeToFive,
        ExperienceLevel::FivePlus,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            ExperienceLevel::Fresher => "fresher",
            ExperienceLevel::OneToThree => "1-3",
            ExperienceLevel::ThreeToFive => "3-5",
            ExperienceLevel::FivePlus => "5+",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExperienceLevel::Fresher => "Fresher (0-1 yr)",
            ExperienceLevel::OneToThree => "1-3 Years",
            ExperienceLevel::ThreeToFive => "3-5 Years",
            ExperienceLevel::FivePlus => "5+ Years",
        }
    }
}

/// Style of the interview round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterviewType {
    Hr,
    Technical,
    Mixed,
    Coding,
}

impl InterviewType {
    pub const ALL: &'static [InterviewType] = &[
        InterviewType::Hr,
        InterviewType::Technical,
        InterviewType::Mixed,
        InterviewType::Coding,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            InterviewType::Hr => "hr",
            InterviewType::Technical => "technical",
            InterviewType::Mixed => "mixed",
            InterviewType::Coding => "coding",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            InterviewType::Hr => "HR Round",
            InterviewType::Technical => "Technical",
            InterviewType::Mixed => "Mixed",
            InterviewType::Coding => "Coding",
        }
    }
}

/// Company-specific interviewing style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanyMode {
    Google,
    Amazon,
    Tcs,
    Generic,
}

impl CompanyMode {
    pub const ALL: &'static [CompanyMode] = &[
        CompanyMode::Google,
        CompanyMode::Amazon,
        CompanyMode::Tcs,
        CompanyMode::Generic,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            CompanyMode::Google => "google",
            CompanyMode::Amazon => "amazon",
            CompanyMode::Tcs => "tcs",
            CompanyMode::Generic => "generic",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CompanyMode::Google => "Google-style (DSA Heavy)",
            CompanyMode::Amazon => "Amazon-style (Leadership Principles)",
            CompanyMode::Tcs => "TCS-style (HR Heavy)",
            CompanyMode::Generic => "Generic",
        }
    }
}

/// Question difficulty.  The lobby always sends `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: &'static [Difficulty] =
        &[Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn slug(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

fn parse_slug<T: Copy>(all: &[T], slug: fn(&T) -> &'static str, s: &str, what: &str) -> Result<T, String> {
    let wanted = s.trim().to_ascii_lowercase();
    all.iter().copied().find(|v| slug(v) == wanted).ok_or_else(|| {
        let options: Vec<&str> = all.iter().map(slug).collect();
        format!("unknown {what} '{s}' (expected one of: {})", options.join(", "))
    })
}

impl FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_slug(Role::ALL, Role::slug, s, "role")
    }
}

impl FromStr for ExperienceLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_slug(ExperienceLevel::ALL, ExperienceLevel::slug, s, "experience level")
    }
}

impl FromStr for InterviewType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_slug(InterviewType::ALL, InterviewType::slug, s, "interview type")
    }
}

impl FromStr for CompanyMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_slug(CompanyMode::ALL, CompanyMode::slug, s, "company mode")
    }
}

impl FromStr for Difficulty {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_slug(Difficulty::ALL, Difficulty::slug, s, "difficulty")
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Lobby handoff, read once when the session starts and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub role: Role,
    pub experience_level: ExperienceLevel,
    pub interview_type: InterviewType,
    pub company_mode: CompanyMode,
    #[serde(default)]
    pub difficulty: Difficulty,
    /// Plain text extracted from the candidate's resume, if one was given.
    #[serde(default)]
    pub resume_text: Option<String>,
}

impl SessionConfig {
    pub fn new(
        role: Role,
        experience_level: ExperienceLevel,
        interview_type: InterviewType,
        company_mode: CompanyMode,
    ) -> Self {
        Self {
            role,
            experience_level,
            interview_type,
            company_mode,
            difficulty: Difficulty::default(),
            resume_text: None,
        }
    }

    pub fn with_resume(mut self, resume_text: Option<String>) -> Self {
        self.resume_text = resume_text.filter(|t| !t.trim().is_empty());
        self
    }
}

// ---------------------------------------------------------------------------
// Transcript values
// ---------------------------------------------------------------------------

/// One generated interview question.  Immutable once the session owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question(String);

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn text(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Candidate,
    Interviewer,
}

/// A single utterance in the session transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    /// The answer window ran out with nothing captured; `text` is the
    /// sentinel.  A typed answer that happens to read like the sentinel
    /// leaves this unset.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub timed_out: bool,
}

impl Turn {
    pub fn interviewer(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Interviewer,
            text: text.into(),
            timed_out: false,
        }
    }

    pub fn candidate(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Candidate,
            text: text.into(),
            timed_out: false,
        }
    }

    /// The candidate turn recorded for a submitted answer.
    pub fn answer(answer: &Answer) -> Self {
        Self {
            timed_out: answer.is_timeout(),
            ..Self::candidate(answer.text())
        }
    }
}

/// Marker recorded when the answer timer ran out with nothing captured.
pub const TIMEOUT_SENTINEL: &str = "[NO_ANSWER_TIMEOUT]";

/// What the candidate handed in for the current question.
///
/// `TimedOut` is distinct from `Given(String::new())` so the evaluator can
/// treat "ran out of time" as its own case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Given(String),
    TimedOut,
}

impl Answer {
    /// Build the answer submitted when the timer expires: whatever partial
    /// transcript exists, or the sentinel when nothing was captured.
    pub fn on_timeout(partial: &str) -> Self {
        let partial = partial.trim();
        if partial.is_empty() {
            Answer::TimedOut
        } else {
            Answer::Given(partial.to_string())
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Answer::TimedOut)
    }

    /// Transcript text for this answer; the sentinel for a timeout.
    pub fn text(&self) -> &str {
        match self {
            Answer::Given(text) => text,
            Answer::TimedOut => TIMEOUT_SENTINEL,
        }
    }
}
