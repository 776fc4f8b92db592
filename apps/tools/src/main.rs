use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use shared::{
    domain::{DeckId, OwnerId},
    protocol::{CreateCardInput, CreateDeckInput},
    validation,
};
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/flashdeck.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateDeck {
        owner: String,
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    AddCard {
        owner: String,
        deck_id: i64,
        front: String,
        back: String,
    },
    ListDecks {
        owner: String,
    },
    ListCards {
        owner: String,
        deck_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::CreateDeck {
            owner,
            name,
            description,
        } => {
            let text = validation::create_deck(&CreateDeckInput { name, description })?;
            let deck = storage.insert_deck(&OwnerId::new(owner), &text).await?;
            info!(deck_id = deck.id.0, "deck created");
            println!("created deck_id={}", deck.id);
        }
        Command::AddCard {
            owner,
            deck_id,
            front,
            back,
        } => {
            let (deck_id, text) = validation::create_card(&CreateCardInput {
                deck_id: DeckId(deck_id),
                front,
                back,
            })?;
            storage
                .deck_for_owner(deck_id, &OwnerId::new(owner))
                .await?
                .ok_or_else(|| anyhow!("deck {deck_id} not found for this owner"))?;
            let card = storage.insert_card(deck_id, &text).await?;
            println!("created card_id={} order={}", card.id, card.order);
        }
        Command::ListDecks { owner } => {
            for deck in storage
                .list_decks_with_card_counts(&OwnerId::new(owner))
                .await?
            {
                println!("{}\t{}\t{} cards", deck.id, deck.name, deck.card_count);
            }
        }
        Command::ListCards { owner, deck_id } => {
            let deck = storage
                .deck_with_cards(DeckId(deck_id), &OwnerId::new(owner))
                .await?
                .ok_or_else(|| anyhow!("deck {deck_id} not found for this owner"))?;
            println!("{}", deck.deck.name);
            for card in deck.cards {
                println!("{}\t{}\t{}\t{}", card.order, card.id, card.front, card.back);
            }
        }
    }

    Ok(())
}
