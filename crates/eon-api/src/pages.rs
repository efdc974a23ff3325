use axum::{Extension, Json, extract::State};

use eon_types::api::{AccountSummary, LandingPage, NavLink, SparkCard, SparksPage};
use eon_types::catalog::{
    ABOUT_SECTION, COMMUNITY_SECTION, HERO_SECTION, SPARK_SECTION, SPARKS, STATS,
};
use eon_types::models::SelectionSet;

use crate::middleware::DeviceId;
use crate::state::AppState;

fn nav() -> Vec<NavLink> {
    vec![
        NavLink {
            name: "Home",
            href: "/",
            section: HERO_SECTION,
        },
        NavLink {
            name: "About",
            href: "/#about-section",
            section: ABOUT_SECTION,
        },
        NavLink {
            name: "Community",
            href: "/#community-section",
            section: COMMUNITY_SECTION,
        },
    ]
}

pub(crate) fn spark_cards(selected: &SelectionSet) -> Vec<SparkCard> {
    SPARKS
        .iter()
        .map(|s| SparkCard {
            id: s.id,
            name: s.name,
            description: s.description,
            selected: selected.contains(s.id),
        })
        .collect()
}

pub async fn landing(
    State(state): State<AppState>,
    Extension(DeviceId(device_id)): Extension<DeviceId>,
) -> Json<LandingPage> {
    let device = state.device(device_id).await;
    let mut session = device.lock().await;

    session.board.ensure_fresh().await;
    let selections = session.selections.snapshot().await;
    let account = session.gateway.account();

    // Signed-in accounts without picks are steered to the sparks.
    let focus = (account.is_some() && selections.selected.is_empty()).then_some(SPARK_SECTION);

    Json(LandingPage {
        nav: nav(),
        stats: STATS,
        sparks: spark_cards(&selections.selected),
        account: account.as_ref().map(AccountSummary::from),
        selections,
        community: session.board.snapshot(),
        focus,
    })
}

pub async fn sparks(
    State(state): State<AppState>,
    Extension(DeviceId(device_id)): Extension<DeviceId>,
) -> Json<SparksPage> {
    let device = state.device(device_id).await;
    let mut session = device.lock().await;
    let selections = session.selections.snapshot().await;

    Json(SparksPage {
        sparks: spark_cards(&selections.selected),
        selections,
    })
}

pub async fn health() -> &'static str {
    "ok"
}
