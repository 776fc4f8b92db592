use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{Card, CardOrder, Deck, DeckId, DeckSummary, DeckWithCards, OwnerId},
    error::{ApiError, ErrorCode},
    protocol::{
        ActionResult, CreateCardInput, CreateDeckInput, DeleteCardInput, DeleteDeckInput,
        LoginRequest, LoginResponse, ReorderCardsInput, UpdateCardInput, UpdateDeckInput,
    },
};
use tracing::warn;
use url::Url;

use crate::error::ClientError;

/// The action layer as seen from a client. Every call resolves to an
/// [`ActionResult`]; transport failures are folded into it as well.
#[async_trait]
pub trait DeckActions: Send + Sync {
    async fn list_decks(&self) -> ActionResult<Vec<DeckSummary>>;
    async fn get_deck(&self, deck_id: DeckId) -> ActionResult<DeckWithCards>;
    async fn create_deck(&self, input: &CreateDeckInput) -> ActionResult<Deck>;
    async fn update_deck(&self, input: &UpdateDeckInput) -> ActionResult<Deck>;
    async fn delete_deck(&self, input: &DeleteDeckInput) -> ActionResult<()>;
    async fn create_card(&self, input: &CreateCardInput) -> ActionResult<Card>;
    async fn update_card(&self, input: &UpdateCardInput) -> ActionResult<Card>;
    async fn delete_card(&self, input: &DeleteCardInput) -> ActionResult<()>;
    async fn reorder_cards(&self, input: &ReorderCardsInput) -> ActionResult<()>;
}

#[derive(Serialize)]
struct DeckBody<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

#[derive(Serialize)]
struct CardBody<'a> {
    front: &'a str,
    back: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReorderBody<'a> {
    card_orders: &'a [CardOrder],
}

/// [`DeckActions`] over the server's JSON routes.
#[derive(Clone)]
pub struct HttpDeckActions {
    http: Client,
    base_url: Url,
    token: String,
}

impl HttpDeckActions {
    pub fn new(server_url: &str, token: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            http: Client::new(),
            base_url: parse_base_url(server_url)?,
            token: token.into(),
        })
    }

    /// Exchanges a user id for a session token and builds a client with it.
    pub async fn login(server_url: &str, user_id: &OwnerId) -> Result<Self, ClientError> {
        let base_url = parse_base_url(server_url)?;
        let http = Client::new();
        let res = http
            .post(base_url.join("login")?)
            .json(&LoginRequest {
                user_id: user_id.clone(),
            })
            .send()
            .await?
            .error_for_status()?;
        let body: LoginResponse = res.json().await?;
        Ok(Self {
            http,
            base_url,
            token: body.token,
        })
    }

    async fn call<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> ActionResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        match self.try_call(method, path, body).await {
            Ok(result) => result,
            Err(err) => {
                warn!(path, error = %err, "action request failed");
                ActionResult::failed(ApiError::new(ErrorCode::Internal, err.to_string()))
            }
        }
    }

    async fn try_call<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ActionResult<T>, ClientError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = self
            .http
            .request(method, self.base_url.join(path)?)
            .bearer_auth(&self.token);
        if let Some(body) = body {
            request = request.json(body);
        }
        let res = request.send().await?;
        // Failures carry an envelope too, so the status is not checked here.
        Ok(res.json::<ActionResult<T>>().await?)
    }
}

#[async_trait]
impl DeckActions for HttpDeckActions {
    async fn list_decks(&self) -> ActionResult<Vec<DeckSummary>> {
        self.call::<_, ()>(Method::GET, "decks", None).await
    }

    async fn get_deck(&self, deck_id: DeckId) -> ActionResult<DeckWithCards> {
        self.call::<_, ()>(Method::GET, &format!("decks/{}", deck_id.0), None)
            .await
    }

    async fn create_deck(&self, input: &CreateDeckInput) -> ActionResult<Deck> {
        let body = DeckBody {
            name: &input.name,
            description: input.description.as_deref(),
        };
        self.call(Method::POST, "decks", Some(&body)).await
    }

    async fn update_deck(&self, input: &UpdateDeckInput) -> ActionResult<Deck> {
        let body = DeckBody {
            name: &input.name,
            description: input.description.as_deref(),
        };
        self.call(Method::PUT, &format!("decks/{}", input.id.0), Some(&body))
            .await
    }

    async fn delete_deck(&self, input: &DeleteDeckInput) -> ActionResult<()> {
        self.call::<_, ()>(Method::DELETE, &format!("decks/{}", input.id.0), None)
            .await
    }

    async fn create_card(&self, input: &CreateCardInput) -> ActionResult<Card> {
        let body = CardBody {
            front: &input.front,
            back: &input.back,
        };
        self.call(
            Method::POST,
            &format!("decks/{}/cards", input.deck_id.0),
            Some(&body),
        )
        .await
    }

    async fn update_card(&self, input: &UpdateCardInput) -> ActionResult<Card> {
        let body = CardBody {
            front: &input.front,
            back: &input.back,
        };
        self.call(
            Method::PUT,
            &format!("decks/{}/cards/{}", input.deck_id.0, input.id.0),
            Some(&body),
        )
        .await
    }

    async fn delete_card(&self, input: &DeleteCardInput) -> ActionResult<()> {
        self.call::<_, ()>(
            Method::DELETE,
            &format!("decks/{}/cards/{}", input.deck_id.0, input.id.0),
            None,
        )
        .await
    }

    async fn reorder_cards(&self, input: &ReorderCardsInput) -> ActionResult<()> {
        let body = ReorderBody {
            card_orders: &input.card_orders,
        };
        self.call(
            Method::POST,
            &format!("decks/{}/reorder", input.deck_id.0),
            Some(&body),
        )
        .await
    }
}

fn parse_base_url(server_url: &str) -> Result<Url, ClientError> {
    if !(server_url.starts_with("http://") || server_url.starts_with("https://")) {
        return Err(ClientError::UnsupportedScheme(server_url.to_string()));
    }
    // A trailing slash makes `join` append instead of replacing the last segment.
    let normalized = format!("{}/", server_url.trim_end_matches('/'));
    Ok(Url::parse(&normalized)?)
}

#[cfg(test)]
#[path = "tests/actions_tests.rs"]
mod tests;
