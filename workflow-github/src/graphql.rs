//! GraphQL calls through `gh api graphql`

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::{Error, GhClient, Result};

/// GraphQL query response wrapper
#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

/// GraphQL error
#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(default)]
    path: Vec<serde_json::Value>,
}

/// A GraphQL variable, passed as `-f` (string) or `-F` (typed)
#[derive(Debug, Clone, Copy)]
pub enum Var<'a> {
    /// Sent verbatim as a string
    Str(&'a str),
    /// Sent as a GraphQL `Int`
    Int(u64),
}

/// Build the `gh api graphql` argument list
pub(crate) fn graphql_args(query: &str, variables: &[(&str, Var<'_>)]) -> Vec<String> {
    let mut args = vec!["api".to_string(), "graphql".to_string()];
    for (key, value) in variables {
        match value {
            Var::Str(s) => {
                args.push("-f".to_string());
                args.push(format!("{}={}", key, s));
            }
            Var::Int(n) => {
                args.push("-F".to_string());
                args.push(format!("{}={}", key, n));
            }
        }
    }
    args.push("-f".to_string());
    args.push(format!("query={}", query));
    args
}

/// Decode a `{data, errors}` envelope
pub(crate) fn decode_response<T: DeserializeOwned>(body: &str) -> Result<T> {
    let response: GraphQlResponse<T> = serde_json::from_str(body)
        .map_err(|e| Error::Parse(format!("Failed to parse GraphQL response: {}", e)))?;

    if !response.errors.is_empty() {
        let messages: Vec<String> = response
            .errors
            .iter()
            .map(|e| {
                if e.path.is_empty() {
                    e.message.clone()
                } else {
                    let path: Vec<String> = e
                        .path
                        .iter()
                        .map(|p| p.to_string().trim_matches('"').to_string())
                        .collect();
                    format!("{} (at {})", e.message, path.join("."))
                }
            })
            .collect();
        return Err(Error::GraphQl(messages.join(", ")));
    }

    response
        .data
        .ok_or_else(|| Error::GraphQl("GraphQL response missing data".to_string()))
}

impl GhClient {
    /// Execute a GraphQL query or mutation
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: &[(&str, Var<'_>)],
    ) -> Result<T> {
        debug!(vars = variables.len(), "Running GraphQL request");
        let args = graphql_args(query, variables);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let body = self.run(&args).await?;
        decode_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Viewer {
        viewer: Login,
    }

    #[derive(Debug, Deserialize)]
    struct Login {
        login: String,
    }

    #[test]
    fn test_graphql_args() {
        let args = graphql_args(
            "query { x }",
            &[("owner", Var::Str("me")), ("pr", Var::Int(12))],
        );
        assert_eq!(
            args,
            vec![
                "api",
                "graphql",
                "-f",
                "owner=me",
                "-F",
                "pr=12",
                "-f",
                "query=query { x }"
            ]
        );
    }

    #[test]
    fn test_decode_data() {
        let body = r#"{"data": {"viewer": {"login": "octocat"}}}"#;
        let decoded: Viewer = decode_response(body).unwrap();
        assert_eq!(decoded.viewer.login, "octocat");
    }

    #[test]
    fn test_decode_errors() {
        let body = r#"{
            "data": null,
            "errors": [{"message": "Could not resolve to a node", "path": ["node", 0]}]
        }"#;
        let err = decode_response::<Viewer>(body).unwrap_err();
        match err {
            Error::GraphQl(msg) => {
                assert!(msg.contains("Could not resolve to a node"));
                assert!(msg.contains("node.0"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_missing_data() {
        assert!(matches!(
            decode_response::<Viewer>(r#"{"data": null}"#),
            Err(Error::GraphQl(_))
        ));
        assert!(matches!(
            decode_response::<Viewer>("not json"),
            Err(Error::Parse(_))
        ));
    }
}
