// ABOUTME: Agent readiness assessment of repositories from upstream content probes
// ABOUTME: Scores customization files, derives a readiness level and renders markdown reports
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Agent Readiness
//!
//! Two assessments share one level scale:
//!
//! - the full assessment probes eight customization locations of one repository
//! - the light assessment probes three key files and is used for team scans

use std::fmt::{self, Display, Write as _};

use serde::Serialize;

use crate::upstream::{UpstreamError, UpstreamIdentityClient};

/// Files probed by the light, per-repository team assessment
pub const LIGHT_AGENTS_MD: &str = "AGENTS.md";
/// Copilot instructions file
pub const LIGHT_COPILOT_INSTRUCTIONS: &str = ".github/copilot-instructions.md";
/// Coding agent setup workflow
pub const LIGHT_SETUP_STEPS: &str = ".github/workflows/copilot-setup-steps.yml";

/// Readiness level of a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessLevel {
    None,
    Basic,
    Intermediate,
    Advanced,
}

impl ReadinessLevel {
    /// Level for the eight-location assessment
    #[must_use]
    pub const fn from_full_score(score: usize) -> Self {
        match score {
            0 => Self::None,
            1..=2 => Self::Basic,
            3..=5 => Self::Intermediate,
            _ => Self::Advanced,
        }
    }

    /// Level for the three-file assessment
    #[must_use]
    pub const fn from_light_score(score: usize) -> Self {
        match score {
            0 => Self::None,
            1 => Self::Basic,
            2 => Self::Intermediate,
            _ => Self::Advanced,
        }
    }

    /// Display label with status marker
    #[must_use]
    pub const fn badge(self) -> &'static str {
        match self {
            Self::None => "🔴 None",
            Self::Basic => "🟡 Basic",
            Self::Intermediate => "🟠 Intermediate",
            Self::Advanced => "🟢 Advanced",
        }
    }
}

impl Display for ReadinessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Basic => "basic",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        })
    }
}

/// How a location is probed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    File,
    Directory,
}

/// One customization location with its recommendation when absent
struct Location {
    path: &'static str,
    probe: Probe,
    recommendation: &'static str,
}

/// Ordered by recommendation priority
const LOCATIONS: [Location; 8] = [
    Location {
        path: "AGENTS.md",
        probe: Probe::File,
        recommendation: "Create AGENTS.md at the repo root. It works across coding agents; include build commands, testing patterns, project structure and code style.",
    },
    Location {
        path: ".github/workflows/copilot-setup-steps.yml",
        probe: Probe::File,
        recommendation: "Add .github/workflows/copilot-setup-steps.yml so the coding agent can pre-install dependencies and run autonomously on issues.",
    },
    Location {
        path: ".github/instructions",
        probe: Probe::Directory,
        recommendation: "Add scoped instructions in .github/instructions/ with applyTo patterns for file-specific guidance.",
    },
    Location {
        path: ".github/copilot-instructions.md",
        probe: Probe::File,
        recommendation: "Add .github/copilot-instructions.md to supplement AGENTS.md with repository-wide guidance.",
    },
    Location {
        path: ".github/agents",
        probe: Probe::Directory,
        recommendation: "Add custom agents in .github/agents/ for specialized personas such as a security reviewer or test writer.",
    },
    Location {
        path: ".github/prompts",
        probe: Probe::Directory,
        recommendation: "Add reusable prompts in .github/prompts/ for repetitive tasks like review checklists or PR descriptions.",
    },
    Location {
        path: ".github/skills",
        probe: Probe::Directory,
        recommendation: "Add skills in .github/skills/ to bundle domain knowledge with scripts and assets.",
    },
    Location {
        path: ".github/hooks/copilot-hooks.json",
        probe: Probe::File,
        recommendation: "Add .github/hooks/copilot-hooks.json to automate linting or validation on session events.",
    },
];

/// Result of probing one location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCheck {
    /// Repository-relative path
    pub path: String,
    /// Whether the file or directory was found
    pub exists: bool,
    /// Entry count for directories
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

/// Full readiness report for one repository
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessReport {
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Overall level
    pub level: ReadinessLevel,
    /// Locations found
    pub score: usize,
    /// Locations checked
    pub max_score: usize,
    /// Per-location results
    pub files: Vec<FileCheck>,
    /// Suggested next steps, most important first
    pub recommendations: Vec<String>,
}

impl ReadinessReport {
    /// Build a report from probe results, in [`LOCATIONS`] order
    fn from_checks(owner: &str, repo: &str, files: Vec<FileCheck>) -> Self {
        let score = files.iter().filter(|f| f.exists).count();
        let recommendations = LOCATIONS
            .iter()
            .zip(&files)
            .filter(|(_, check)| !check.exists)
            .map(|(location, _)| location.recommendation.to_owned())
            .collect();

        Self {
            owner: owner.to_owned(),
            repo: repo.to_owned(),
            level: ReadinessLevel::from_full_score(score),
            score,
            max_score: LOCATIONS.len(),
            files,
            recommendations,
        }
    }

    /// Render as markdown
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Agent Readiness Report: {}/{}\n", self.owner, self.repo);
        let _ = writeln!(
            out,
            "**Level**: {} ({}/{})\n",
            self.level.badge(),
            self.score,
            self.max_score
        );
        let _ = writeln!(out, "## Agent Customizations ({}/{})\n", self.score, self.max_score);

        // Display in repository layout order rather than priority order
        let mut files: Vec<&FileCheck> = self.files.iter().collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        for file in files {
            let _ = write!(out, "{} {}", check_mark(file.exists), file.path);
            if file.count.is_some() {
                out.push('/');
            }
            match file.count {
                Some(count) if count > 0 => {
                    let _ = writeln!(out, " ({count} files)");
                }
                _ => out.push('\n'),
            }
        }

        if !self.recommendations.is_empty() {
            out.push_str("\n## Recommendations (in priority order)\n\n");
            for (i, rec) in self.recommendations.iter().enumerate() {
                let _ = writeln!(out, "{}. {rec}\n", i + 1);
            }
        }
        out
    }
}

/// Light snapshot of one repository in a team scan
#[derive(Debug, Clone, Serialize)]
pub struct RepoReadiness {
    /// Repository name
    pub repo: String,
    /// `AGENTS.md` present
    pub agents_md: bool,
    /// `.github/copilot-instructions.md` present
    pub copilot_instructions: bool,
    /// Copilot setup steps workflow present
    pub setup_steps: bool,
    /// Level from the three files
    pub level: ReadinessLevel,
}

impl RepoReadiness {
    /// Assess from the three key files
    #[must_use]
    pub fn light(repo: &str, agents_md: bool, copilot_instructions: bool, setup_steps: bool) -> Self {
        let score = [agents_md, copilot_instructions, setup_steps]
            .into_iter()
            .filter(|present| *present)
            .count();
        Self {
            repo: repo.to_owned(),
            agents_md,
            copilot_instructions,
            setup_steps,
            level: ReadinessLevel::from_light_score(score),
        }
    }
}

/// Readiness across a team's repositories
#[derive(Debug, Clone, Serialize)]
pub struct TeamSummary {
    /// Organization scanned
    pub org: String,
    /// Team slug or prefix label
    pub team: String,
    /// Assessed repositories
    pub repos: Vec<RepoReadiness>,
}

impl TeamSummary {
    /// Render as markdown
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let total = self.repos.len();
        let count_where = |pred: fn(&RepoReadiness) -> bool| self.repos.iter().filter(|r| pred(r)).count();
        let agents = count_where(|r| r.agents_md);
        let copilot = count_where(|r| r.copilot_instructions);
        let setup = count_where(|r| r.setup_steps);

        let mut out = String::new();
        let _ = writeln!(out, "# Agent Readiness: {}/{}\n", self.org, self.team);
        let _ = writeln!(out, "**{total} repos** scanned\n");
        out.push_str("| Metric | Count | Percentage |\n");
        out.push_str("|--------|-------|------------|\n");
        let _ = writeln!(out, "| AGENTS.md | {agents} | {}% |", percent(agents, total));
        let _ = writeln!(
            out,
            "| copilot-instructions.md | {copilot} | {}% |",
            percent(copilot, total)
        );
        let _ = writeln!(
            out,
            "| copilot-setup-steps.yml | {setup} | {}% |",
            percent(setup, total)
        );

        out.push_str("\n**Readiness levels:**\n\n");
        for level in [
            ReadinessLevel::Advanced,
            ReadinessLevel::Intermediate,
            ReadinessLevel::Basic,
            ReadinessLevel::None,
        ] {
            let count = self.repos.iter().filter(|r| r.level == level).count();
            if count > 0 {
                let _ = writeln!(out, "- {}: {count} repos", level.badge());
            }
        }

        out.push_str("\n## Per-repo breakdown\n\n");
        out.push_str("| Repository | AGENTS.md | Instructions | Setup Steps | Level |\n");
        out.push_str("|------------|-----------|--------------|-------------|-------|\n");
        for r in &self.repos {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} |",
                r.repo,
                check_mark(r.agents_md),
                check_mark(r.copilot_instructions),
                check_mark(r.setup_steps),
                r.level.badge()
            );
        }
        out
    }
}

const fn check_mark(present: bool) -> &'static str {
    if present {
        "✅"
    } else {
        "❌"
    }
}

fn percent(count: usize, total: usize) -> usize {
    if total == 0 {
        0
    } else {
        count * 100 / total
    }
}

/// Probe all eight locations of `owner/repo`
///
/// # Errors
/// Returns the first upstream failure; absent files are not failures
pub async fn assess_repository(
    upstream: &dyn UpstreamIdentityClient,
    access_token: &str,
    owner: &str,
    repo: &str,
) -> Result<ReadinessReport, UpstreamError> {
    let mut files = Vec::with_capacity(LOCATIONS.len());
    for location in &LOCATIONS {
        let check = match location.probe {
            Probe::File => FileCheck {
                path: location.path.to_owned(),
                exists: upstream
                    .repo_file_exists(access_token, owner, repo, location.path)
                    .await?,
                count: None,
            },
            Probe::Directory => {
                let count = upstream
                    .directory_count(access_token, owner, repo, location.path)
                    .await?;
                FileCheck {
                    path: location.path.to_owned(),
                    exists: count > 0,
                    count: Some(count),
                }
            }
        };
        files.push(check);
    }
    Ok(ReadinessReport::from_checks(owner, repo, files))
}

/// Light assessment of one repository; probe failures count as absent
pub async fn assess_repository_light(
    upstream: &dyn UpstreamIdentityClient,
    access_token: &str,
    owner: &str,
    repo: &str,
) -> RepoReadiness {
    let probe = |path: &'static str| async move {
        upstream
            .repo_file_exists(access_token, owner, repo, path)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Readiness probe {}/{}/{} failed: {}", owner, repo, path, e);
                false
            })
    };
    let agents_md = probe(LIGHT_AGENTS_MD).await;
    let copilot = probe(LIGHT_COPILOT_INSTRUCTIONS).await;
    let setup = probe(LIGHT_SETUP_STEPS).await;
    RepoReadiness::light(repo, agents_md, copilot, setup)
}
