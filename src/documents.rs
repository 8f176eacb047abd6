//! Client for the remote document service: CRUD plus version history.

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Serialize)]
struct SaveRequest<'a> {
    title: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
}

#[derive(Deserialize)]
struct ListEnvelope {
    success: bool,
    #[serde(default)]
    documents: Vec<Document>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct GetEnvelope {
    success: bool,
    document: Option<Document>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct SaveEnvelope {
    success: bool,
    id: Option<i64>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct DeleteEnvelope {
    success: bool,
    error: Option<String>,
}

#[derive(Deserialize)]
struct HistoryEnvelope {
    success: bool,
    #[serde(default)]
    history: Vec<HistoryEntry>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct DocumentClient {
    client: Client,
    base_url: String,
}

impl DocumentClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn list(&self) -> Result<Vec<Document>> {
        let url = format!("{}/api/documents", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("listing documents failed: {}", response.status()));
        }
        let envelope: ListEnvelope = response.json().await?;
        if !envelope.success {
            return Err(anyhow!(server_error(envelope.error)));
        }
        Ok(envelope.documents)
    }

    pub async fn get(&self, id: i64) -> Result<Document> {
        let url = format!("{}/api/documents/{}", self.base_url, id);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("fetching document {} failed: {}", id, response.status()));
        }
        let envelope: GetEnvelope = response.json().await?;
        if !envelope.success {
            return Err(anyhow!(server_error(envelope.error)));
        }
        envelope
            .document
            .ok_or_else(|| anyhow!("document {} missing from response", id))
    }

    /// Create or update; the server assigns the id on create.
    pub async fn save(&self, title: &str, content: &str, id: Option<i64>) -> Result<i64> {
        let url = format!("{}/api/documents", self.base_url);
        let request = SaveRequest { title, content, id };
        let response = self.client.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("saving document failed: {}", response.status()));
        }
        let envelope: SaveEnvelope = response.json().await?;
        if !envelope.success {
            return Err(anyhow!(server_error(envelope.error)));
        }
        envelope
            .id
            .ok_or_else(|| anyhow!("save response carried no document id"))
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let url = format!("{}/api/documents/{}", self.base_url, id);
        let response = self.client.delete(&url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("deleting document {} failed: {}", id, response.status()));
        }
        let envelope: DeleteEnvelope = response.json().await?;
        if !envelope.success {
            return Err(anyhow!(server_error(envelope.error)));
        }
        Ok(())
    }

    pub async fn history(&self, id: i64) -> Result<Vec<HistoryEntry>> {
        let url = format!("{}/api/documents/{}/history", self.base_url, id);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("fetching history for {} failed: {}", id, response.status()));
        }
        let envelope: HistoryEnvelope = response.json().await?;
        if !envelope.success {
            return Err(anyhow!(server_error(envelope.error)));
        }
        Ok(envelope.history)
    }
}

fn server_error(error: Option<String>) -> String {
    error.unwrap_or_else(|| "unspecified server error".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn canned_server(body: &str) -> String {
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 8192];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn list_parses_document_envelopes() {
        let base = canned_server(
            r##"{"success": true, "documents": [
                {"id": 1, "title": "Notes", "content": "# Notes", "updated_at": "2024-01-01"},
                {"id": 2, "title": "Draft", "content": ""}
            ]}"##,
        )
        .await;
        let client = DocumentClient::new(&base);
        let documents = client.list().await.unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].title, "Notes");
        assert_eq!(documents[1].id, 2);
    }

    #[tokio::test]
    async fn save_returns_the_assigned_id() {
        let base = canned_server(r#"{"success": true, "id": 42}"#).await;
        let client = DocumentClient::new(&base);
        let id = client.save("Untitled", "body", None).await.unwrap();
        assert_eq!(id, 42);
    }

    #[tokio::test]
    async fn server_refusal_becomes_an_error() {
        let base = canned_server(r#"{"success": false, "error": "document not found"}"#).await;
        let client = DocumentClient::new(&base);
        let err = client.get(99).await.unwrap_err();
        assert!(err.to_string().contains("document not found"));
    }
}
