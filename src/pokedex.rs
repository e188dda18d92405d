use async_trait::async_trait;
use serde::Deserialize;
use std::{collections::HashMap, sync::Arc};

use crate::models::PokemonLookup;

/// PokedexError
#[derive(Debug, thiserror::Error)]
pub enum PokedexError {
    #[error("PokeAPI request failed: {0}")]
    Request(String),
}

/// Pokedex
///
/// Name lookup against the public Pokémon catalogue. `Ok(None)` means "no such Pokémon".
#[async_trait]
pub trait Pokedex: Send + Sync {
    async fn search(&self, name: &str) -> Result<Option<PokemonLookup>, PokedexError>;
}

pub type PokedexState = Arc<dyn Pokedex>;

// Subset of PokeAPI's `/pokemon/{name}` payload.
#[derive(Debug, Deserialize)]
pub struct ApiPokemon {
    pub id: i64,
    pub name: String,
    pub sprites: Sprites,
}

#[derive(Debug, Default, Deserialize)]
pub struct Sprites {
    pub front_default: Option<String>,
    #[serde(default)]
    pub other: Option<OtherSprites>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OtherSprites {
    #[serde(rename = "official-artwork", default)]
    pub official_artwork: Option<Artwork>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Artwork {
    pub front_default: Option<String>,
}

/// image_url
///
/// Official artwork when present, else the default sprite, else an empty string.
pub fn image_url(sprites: &Sprites) -> String {
    let artwork = sprites
        .other
        .as_ref()
        .and_then(|other| other.official_artwork.as_ref())
        .and_then(|artwork| artwork.front_default.as_deref())
        .filter(|url| !url.is_empty());

    artwork
        .or(sprites.front_default.as_deref().filter(|url| !url.is_empty()))
        .unwrap_or_default()
        .to_string()
}

impl From<ApiPokemon> for PokemonLookup {
    fn from(pokemon: ApiPokemon) -> Self {
        PokemonLookup {
            pokemon_id: pokemon.id,
            pokemon_image_url: image_url(&pokemon.sprites),
            pokemon_name: pokemon.name,
        }
    }
}

/// PokedexClient
///
/// `Pokedex` backed by PokeAPI (`POKEAPI_URL`, default `https://pokeapi.co/api/v2`).
#[derive(Clone)]
pub struct PokedexClient {
    client: reqwest::Client,
    base_url: String,
}

impl PokedexClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Pokedex for PokedexClient {
    async fn search(&self, name: &str) -> Result<Option<PokemonLookup>, PokedexError> {
        let name = name.trim().to_lowercase();
        if name.is_empty() {
            return Ok(None);
        }

        let response = self
            .client
            .get(format!("{}/pokemon/{}", self.base_url, name))
            .send()
            .await
            .map_err(|e| PokedexError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let pokemon = response
            .error_for_status()
            .map_err(|e| PokedexError::Request(e.to_string()))?
            .json::<ApiPokemon>()
            .await
            .map_err(|e| PokedexError::Request(e.to_string()))?;

        Ok(Some(pokemon.into()))
    }
}

/// MockPokedex
///
/// Fixed catalogue keyed by lower-case name.
#[derive(Clone, Default)]
pub struct MockPokedex {
    entries: HashMap<String, PokemonLookup>,
}

impl MockPokedex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, entry: PokemonLookup) -> Self {
        self.entries.insert(entry.pokemon_name.to_lowercase(), entry);
        self
    }
}

#[async_trait]
impl Pokedex for MockPokedex {
    async fn search(&self, name: &str) -> Result<Option<PokemonLookup>, PokedexError> {
        Ok(self.entries.get(&name.trim().to_lowercase()).cloned())
    }
}
