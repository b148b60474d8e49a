// ABOUTME: Turns a fuzzy container pattern into a ready-to-dial execute URL
// Lists matches, lets the operator disambiguate, then trades the pick for an execute grant

use super::client::RancherClient;
use super::error::ResolveError;
use super::models::{ContainerCandidate, ExecRequest};
use super::operator::Operator;
use tracing::{info, warn};

const SELECTION_SEPARATOR: &str = "--------------------------------------------";
const SELECTION_PROMPT: &str = "Which one you want to connect: ";

pub struct SessionResolver<O: Operator> {
    client: RancherClient,
    operator: O,
}

impl<O: Operator> SessionResolver<O> {
    pub fn new(client: RancherClient, operator: O) -> Self {
        Self { client, operator }
    }

    /// Control-plane endpoint, sent as `Origin` when dialing the grant.
    pub fn origin(&self) -> &str {
        self.client.endpoint()
    }

    /// Resolves `pattern` to exactly one running container and returns the
    /// tokenized URL of a fresh interactive execute session on it.
    pub async fn resolve_container(&mut self, pattern: &str) -> Result<String, ResolveError> {
        let container = self.select_container(pattern).await?;
        self.request_dial_url(&container).await
    }

    /// Picks the single container `pattern` refers to, asking the operator
    /// when more than one matches.
    pub async fn select_container(
        &mut self,
        pattern: &str,
    ) -> Result<ContainerCandidate, ResolveError> {
        self.operator.say(&format!("Searching for container {pattern}"));

        let mut candidates = self.client.list_running_containers(pattern).await?;
        info!("Pattern {} matched {} container(s)", pattern, candidates.len());

        let index = match candidates.len() {
            0 => {
                return Err(ResolveError::NotFound {
                    pattern: pattern.to_string(),
                })
            }
            1 => 0,
            _ => self.choose(&candidates)?,
        };

        let container = candidates.swap_remove(index);
        info!("Selected container {}", container);
        self.operator.say(&container.target_line());
        Ok(container)
    }

    /// Requests an execute grant sized to the operator's terminal and
    /// consumes it into the dial URL.
    pub async fn request_dial_url(
        &mut self,
        container: &ContainerCandidate,
    ) -> Result<String, ResolveError> {
        self.operator.say("Getting access token");

        let body = ExecRequest::interactive_shell(self.operator.geometry());
        let grant = self.client.request_exec(&container.id, &body).await?;
        Ok(grant.into_dial_url())
    }

    fn choose(&mut self, candidates: &[ContainerCandidate]) -> Result<usize, ResolveError> {
        self.operator.say("We found more than one containers in system:");
        for (i, candidate) in candidates.iter().enumerate() {
            self.operator.say(&candidate.listing_line(i + 1));
        }
        self.operator.say(SELECTION_SEPARATOR);

        let answer = self
            .operator
            .ask(SELECTION_PROMPT)
            .map_err(ResolveError::SelectionAborted)?;
        parse_selection(&answer, candidates.len())
    }
}

/// Parses a 1-indexed choice and returns the matching 0-based position.
pub fn parse_selection(answer: &str, count: usize) -> Result<usize, ResolveError> {
    let trimmed = answer.trim();
    match trimmed.parse::<usize>() {
        Ok(choice) if (1..=count).contains(&choice) => Ok(choice - 1),
        _ => {
            warn!("Rejected selection {:?} for {} candidates", trimmed, count);
            Err(ResolveError::InvalidSelection {
                input: trimmed.to_string(),
                count,
            })
        }
    }
}
