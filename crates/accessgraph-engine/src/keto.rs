//! Ory Keto client implementing the tuple-engine boundary.
//!
//! Writes go to the admin API, checks and listings to the read API. A
//! subject is sent as `subject_id` or as a `subject_set`, matching Keto's
//! REST encoding.

use accessgraph_core::error::GraphResult;
use accessgraph_core::tuple::{RelationTuple, Subject, TupleEngine, TupleQuery};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::KetoConfig;
use crate::error::TupleError;

#[derive(Debug, Serialize, Deserialize)]
struct SubjectSetBody {
    namespace: String,
    object: String,
    relation: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct TupleBody {
    namespace: String,
    object: String,
    relation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject_set: Option<SubjectSetBody>,
}

impl From<&RelationTuple> for TupleBody {
    fn from(tuple: &RelationTuple) -> Self {
        let (subject_id, subject_set) = match &tuple.subject {
            Subject::Id(id) => (Some(id.clone()), None),
            Subject::Set {
                namespace,
                object,
                relation,
            } => (
                None,
                Some(SubjectSetBody {
                    namespace: namespace.clone(),
                    object: object.clone(),
                    relation: relation.clone(),
                }),
            ),
        };
        Self {
            namespace: tuple.namespace.clone(),
            object: tuple.object.clone(),
            relation: tuple.relation.clone(),
            subject_id,
            subject_set,
        }
    }
}

impl TryFrom<TupleBody> for RelationTuple {
    type Error = TupleError;

    fn try_from(body: TupleBody) -> Result<Self, Self::Error> {
        let subject = match (body.subject_id, body.subject_set) {
            (Some(id), _) => Subject::Id(id),
            (None, Some(set)) => Subject::Set {
                namespace: set.namespace,
                object: set.object,
                relation: set.relation,
            },
            (None, None) => {
                return Err(TupleError::Decode(format!(
                    "tuple {}:{}#{} has no subject",
                    body.namespace, body.object, body.relation
                )));
            }
        };
        Ok(RelationTuple {
            namespace: body.namespace,
            object: body.object,
            relation: body.relation,
            subject,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CheckResponse {
    allowed: bool,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    relation_tuples: Vec<TupleBody>,
    #[serde(default)]
    next_page_token: String,
}

/// HTTP client for one Keto deployment.
#[derive(Debug, Clone)]
pub struct KetoClient {
    http: Client,
    config: KetoConfig,
}

impl KetoClient {
    pub fn new(config: KetoConfig) -> Result<Self, TupleError> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { http, config })
    }

    fn read_url(&self, path: &str) -> String {
        format!("{}{path}", self.config.read_url.trim_end_matches('/'))
    }

    fn write_url(&self, path: &str) -> String {
        format!("{}{path}", self.config.write_url.trim_end_matches('/'))
    }

    fn query_params(query: &TupleQuery, page_size: u32, page_token: &str) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(namespace) = &query.namespace {
            params.push(("namespace".to_string(), namespace.clone()));
        }
        if let Some(object) = &query.object {
            params.push(("object".to_string(), object.clone()));
        }
        if let Some(relation) = &query.relation {
            params.push(("relation".to_string(), relation.clone()));
        }
        match &query.subject {
            Some(Subject::Id(id)) => params.push(("subject_id".to_string(), id.clone())),
            Some(Subject::Set {
                namespace,
                object,
                relation,
            }) => {
                params.push(("subject_set.namespace".to_string(), namespace.clone()));
                params.push(("subject_set.object".to_string(), object.clone()));
                params.push(("subject_set.relation".to_string(), relation.clone()));
            }
            None => {}
        }
        params.push(("page_size".to_string(), page_size.to_string()));
        if !page_token.is_empty() {
            params.push(("page_token".to_string(), page_token.to_string()));
        }
        params
    }
}

/// Turn a non-success response into [`TupleError::Status`].
async fn ensure_success(response: Response) -> Result<Response, TupleError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TupleError::Status {
        status: status.as_u16(),
        body,
    })
}

impl TupleEngine for KetoClient {
    #[instrument(skip(self), fields(tuple = %tuple))]
    async fn write_tuple(&self, tuple: RelationTuple) -> GraphResult<()> {
        let response = self
            .http
            .put(self.write_url("/admin/relation-tuples"))
            .json(&TupleBody::from(&tuple))
            .send()
            .await
            .map_err(TupleError::from)?;
        ensure_success(response).await?;
        debug!("Relation tuple written");
        Ok(())
    }

    #[instrument(skip(self), fields(tuple = %tuple))]
    async fn check_tuple(&self, tuple: &RelationTuple) -> GraphResult<bool> {
        let response = self
            .http
            .post(self.read_url("/relation-tuples/check/openapi"))
            .json(&TupleBody::from(tuple))
            .send()
            .await
            .map_err(TupleError::from)?;
        let body: CheckResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| TupleError::Decode(e.to_string()))?;
        Ok(body.allowed)
    }

    #[instrument(skip(self))]
    async fn list_tuples(&self, query: &TupleQuery) -> GraphResult<Vec<RelationTuple>> {
        let mut tuples = Vec::new();
        let mut page_token = String::new();
        loop {
            let response = self
                .http
                .get(self.read_url("/relation-tuples"))
                .query(&Self::query_params(query, self.config.page_size, &page_token))
                .send()
                .await
                .map_err(TupleError::from)?;
            let page: ListResponse = ensure_success(response)
                .await?
                .json()
                .await
                .map_err(|e| TupleError::Decode(e.to_string()))?;

            for body in page.relation_tuples {
                tuples.push(RelationTuple::try_from(body)?);
            }
            if page.next_page_token.is_empty() {
                break;
            }
            page_token = page.next_page_token;
        }
        debug!(count = tuples.len(), "Relation tuples listed");
        Ok(tuples)
    }
}
