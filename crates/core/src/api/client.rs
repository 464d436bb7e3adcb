use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use super::wire::{RawGameData, SolveRequest};
use super::ApiError;
use crate::config::AppConfig;
use crate::models::{GameData, SolutionSet};

const DATA_PATH: &str = "/api/data";
const SOLVE_PATH: &str = "/api/solve";

/// Talks to the backend's data and solve endpoints.
#[derive(Debug, Clone)]
pub struct SolverClient {
    http: reqwest::Client,
    base_url: String,
    num_alternatives: u32,
}

impl SolverClient {
    /// Build a client from application configuration.
    pub fn new(config: &AppConfig) -> Result<Self, ApiError> {
        Self::with_base_url(
            &config.server_url,
            config.num_alternatives,
            config.request_timeout(),
        )
    }

    /// Build a client against an explicit backend URL.
    pub fn with_base_url(
        base_url: impl Into<String>,
        num_alternatives: u32,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            num_alternatives,
        })
    }

    /// Number of alternatives requested per solve.
    pub fn num_alternatives(&self) -> u32 {
        self.num_alternatives
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Fetch cities, segments, tickets and scoring.
    pub async fn fetch_game_data(&self) -> Result<GameData, ApiError> {
        let url = self.endpoint(DATA_PATH);
        info!(%url, "Fetching game data");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;
        let raw: RawGameData = decode(&url, response).await?;
        Ok(raw.into_game_data())
    }

    /// Send a prepared request to the solver.
    pub async fn solve(&self, request: &SolveRequest) -> Result<SolutionSet, ApiError> {
        let url = self.endpoint(SOLVE_PATH);
        debug!(
            %url,
            tickets = request.tickets.len(),
            blocked = request.blocked.len(),
            "Sending solve request"
        );
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.clone(),
                source,
            })?;
        decode(&url, response).await
    }
}

async fn decode<T: DeserializeOwned>(url: &str, response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Status {
            url: url.to_string(),
            status,
        });
    }
    let body = response
        .bytes()
        .await
        .map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
    serde_json::from_slice(&body).map_err(|source| ApiError::Decode {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use anyhow::Result;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
        task::JoinHandle,
    };

    use super::*;
    use crate::board::SelectionState;
    use crate::models::Ticket;

    /// Accept one connection, answer it with `status` and `body`, and hand
    /// back the request body that was received.
    async fn respond_once(status: &'static str, body: &str) -> Result<(String, JoinHandle<Result<String>>)> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let body = body.to_string();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await?;
            let request = read_request_body(&mut socket).await?;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await?;
            socket.shutdown().await?;
            Ok(request)
        });
        Ok((format!("http://{addr}"), handle))
    }

    async fn read_request_body(socket: &mut TcpStream) -> Result<String> {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await?;
            if n == 0 {
                return Ok(String::new());
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
            let length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let start = header_end + 4;
            if buf.len() >= start + length {
                return Ok(String::from_utf8_lossy(&buf[start..start + length]).into_owned());
            }
        }
    }

    fn client(url: &str) -> SolverClient {
        SolverClient::with_base_url(url, 2, Duration::from_secs(5)).expect("client")
    }

    #[tokio::test]
    async fn fetches_game_data() -> Result<()> {
        let (url, server) = respond_once(
            "200 OK",
            r#"{"cities": {"B": {"x": 1, "y": 2}, "A": {"x": 3, "y": 4}},
                "routes": [{"index": 0, "from": "A", "to": "B", "length": 3,
                            "color": "red", "tunnel": true, "ferry": 0}],
                "tickets": [{"index": 0, "from": "A", "to": "B", "points": 7, "is_long": true}],
                "scoring": {"3": 4}}"#,
        )
        .await?;

        let data = client(&url).fetch_game_data().await?;
        server.await??;
        assert_eq!(data.city_names(), vec!["B", "A"]);
        assert!(data.segment(0).is_some_and(|s| s.tunnel));
        assert_eq!(data.points_for_length(3), 4);
        Ok(())
    }

    #[tokio::test]
    async fn posts_selection_and_decodes_solutions() -> Result<()> {
        let (url, server) = respond_once(
            "200 OK",
            r#"{"selected_tickets": [{"from": "A", "to": "B", "points": 7, "is_long": true}],
                "terminals": ["A", "B"],
                "solutions": [{"label": "Main", "total_cars": 3, "total_points": 4,
                               "edges": [{"from": "A", "to": "B", "length": 3, "color": "red",
                                          "tunnel": false, "ferry": 0, "points": 4,
                                          "route_index": 0}]}]}"#,
        )
        .await?;

        let data = GameData::new(
            vec![],
            vec![],
            vec![Ticket {
                index: 0,
                from: "A".to_string(),
                to: "B".to_string(),
                points: 7,
                is_long: true,
            }],
            BTreeMap::new(),
        );
        let mut selection = SelectionState::new();
        selection.toggle_ticket(&data, 0)?;
        let client = client(&format!("{url}/"));
        let request = SolveRequest::from_selection(&selection, client.num_alternatives())
            .expect("one ticket selected");

        let set = client.solve(&request).await?;
        let body: serde_json::Value = serde_json::from_str(&server.await??)?;
        assert_eq!(
            body,
            serde_json::json!({"tickets": [0], "blocked": [], "num_alternatives": 2})
        );
        assert_eq!(set.solutions.len(), 1);
        assert_eq!(set.solutions[0].edges[0].route_index, Some(0));
        assert_eq!(set.ticket_points(), 7);
        Ok(())
    }

    #[tokio::test]
    async fn error_status_and_bad_body_are_reported() -> Result<()> {
        let (url, server) = respond_once("500 Internal Server Error", "{}").await?;
        let err = client(&url).fetch_game_data().await.unwrap_err();
        server.await??;
        assert!(matches!(err, ApiError::Status { status, .. } if status.as_u16() == 500));

        let (url, server) = respond_once("200 OK", r#"{"solutions": "nope"}"#).await?;
        let request = SolveRequest {
            tickets: vec![0],
            blocked: vec![],
            num_alternatives: 2,
        };
        let err = client(&url).solve(&request).await.unwrap_err();
        server.await??;
        assert!(matches!(err, ApiError::Decode { .. }));
        Ok(())
    }
}
