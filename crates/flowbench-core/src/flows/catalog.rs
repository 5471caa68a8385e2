//! Step scripts for the built-in flows.

use super::{FlowId, ScriptedFlow, Secret, Step};
use crate::config::Pacing;
use crate::driver::Selector;

const ELEMENT_TIMEOUT_MS: u64 = 15_000;
const BALANCE_TIMEOUT_MS: u64 = 20_000;
const TAB_PAUSE_MS: u64 = 500;

pub const HOME_ROUTE: &str = "home.html";

pub fn balance() -> Selector {
    Selector::test_id("eth-overview__primary-currency")
}

/// Stray network picker left open by a previous iteration.
pub fn network_menu() -> Selector {
    Selector::css(".multichain-network-list-menu-content-wrapper")
}

pub fn network_menu_close() -> Selector {
    Selector::test_id("modal-header-close-button")
}

fn tokens_tab() -> Selector {
    Selector::test_id("account-overview__asset-tab")
}

fn nfts_tab() -> Selector {
    Selector::test_id("account-overview__nfts-tab")
}

fn activity_tab() -> Selector {
    Selector::test_id("account-overview__activity-tab")
}

fn account_item(name: &str) -> Selector {
    Selector::with_text(".multichain-account-list-item__account-name", name)
}

fn network_item(name: &str) -> Selector {
    Selector::test_id(name)
}

/// Unlock the power-user wallet and wait for the balance. A balance that
/// never shows up degrades to a fixed wait instead of failing the load.
fn unlock_prelude(pacing: &Pacing) -> Vec<Step> {
    vec![
        Step::wait(Selector::css("#password"), ELEMENT_TIMEOUT_MS),
        Step::FillSecret {
            selector: Selector::css("#password"),
            secret: Secret::Password,
        },
        Step::click(Selector::test_id("unlock-submit")),
        Step::Attempt {
            steps: vec![Step::wait(balance(), BALANCE_TIMEOUT_MS)],
            fallback: vec![Step::Delay(pacing.balance_fallback_ms)],
        },
    ]
}

fn open_account_menu_and_pick(name: &str) -> Vec<Step> {
    vec![
        Step::click(Selector::test_id("account-menu-icon")),
        Step::Attempt {
            steps: vec![
                Step::wait(
                    Selector::css(".multichain-account-list-item__account-name"),
                    ELEMENT_TIMEOUT_MS,
                ),
                Step::Delay(500),
            ],
            fallback: vec![Step::Delay(300)],
        },
        Step::optional(vec![Step::tracked(account_item(name)), Step::Delay(1000)]),
    ]
}

fn switch_network(name: &str) -> Vec<Step> {
    vec![
        Step::wait(Selector::test_id("sort-by-networks"), ELEMENT_TIMEOUT_MS),
        Step::click(Selector::test_id("sort-by-networks")),
        Step::wait(network_menu_close(), ELEMENT_TIMEOUT_MS),
        Step::Delay(300),
        Step::Attempt {
            steps: vec![Step::tracked(network_item(name)), Step::Delay(1000)],
            fallback: vec![Step::click(network_menu_close())],
        },
    ]
}

fn scroll_list(tab: Selector, container: &str) -> Vec<Step> {
    vec![
        Step::tracked(tab),
        Step::Delay(TAB_PAUSE_MS),
        Step::Scroll {
            selector: Selector::css(container),
            pixels: 300,
            times: 10,
            pause_ms: 200,
        },
        Step::Navigate(HOME_ROUTE.to_string()),
        Step::tracked(activity_tab()),
        Step::Delay(TAB_PAUSE_MS),
    ]
}

fn body(id: FlowId) -> Vec<Step> {
    match id {
        FlowId::TabSwitching => vec![
            Step::wait(tokens_tab(), ELEMENT_TIMEOUT_MS),
            Step::tracked(tokens_tab()),
            Step::Delay(TAB_PAUSE_MS),
            Step::tracked(nfts_tab()),
            Step::Delay(TAB_PAUSE_MS),
            Step::tracked(activity_tab()),
            Step::Delay(TAB_PAUSE_MS),
            Step::tracked(tokens_tab()),
            Step::Delay(TAB_PAUSE_MS),
        ],
        FlowId::AccountSwitching => ["Account 2", "Account 3", "Account 1"]
            .into_iter()
            .flat_map(open_account_menu_and_pick)
            .collect(),
        FlowId::NetworkSwitching => {
            let mut steps = switch_network("Sei");
            steps.extend(switch_network("Ethereum"));
            steps
        }
        FlowId::NetworkAdding => vec![
            Step::click(Selector::test_id("network-display")),
            Step::wait(
                Selector::with_text("button", "Add a custom network"),
                ELEMENT_TIMEOUT_MS,
            ),
            Step::tracked(Selector::with_text("button", "Add a custom network")),
            Step::click(Selector::test_id("test-add-rpc-drop-down")),
            Step::click(Selector::with_text("button", "Add RPC URL")),
            Step::fill(Selector::test_id("rpc-url-input-test"), "http://127.0.0.1:8546"),
            Step::fill(Selector::test_id("rpc-name-input-test"), "Localhost 8546 RPC"),
            Step::click(Selector::with_text("button", "Add URL")),
            Step::Delay(2000),
            Step::fill(Selector::test_id("network-form-network-name"), "Localhost 8546"),
            Step::fill(Selector::test_id("network-form-chain-id"), "1338"),
            Step::fill(Selector::test_id("network-form-ticker-input"), "ETH"),
            Step::Delay(1000),
            Step::tracked(Selector::with_text("button", "Save")),
            Step::Delay(1000),
            Step::optional(vec![Step::click(Selector::test_id("alert-modal-button"))]),
        ],
        FlowId::ImportSrp => vec![
            Step::wait(Selector::test_id("onboarding-import-wallet"), ELEMENT_TIMEOUT_MS),
            Step::click(Selector::test_id("onboarding-import-wallet")),
            Step::optional(vec![Step::click(Selector::test_id(
                "onboarding-import-with-srp-button",
            ))]),
            Step::FillSecret {
                selector: Selector::test_id("srp-input-import__srp-note"),
                secret: Secret::Srp,
            },
            Step::tracked(Selector::test_id("import-srp-confirm")),
            Step::FillSecret {
                selector: Selector::test_id("create-password-new-input"),
                secret: Secret::Password,
            },
            Step::FillSecret {
                selector: Selector::test_id("create-password-confirm-input"),
                secret: Secret::Password,
            },
            Step::click(Selector::test_id("create-password-terms")),
            Step::tracked(Selector::test_id("create-password-submit")),
            Step::optional(vec![Step::click(Selector::test_id("metametrics-i-agree"))]),
            Step::tracked(Selector::test_id("onboarding-complete-done")),
            Step::optional(vec![Step::click(Selector::test_id("pin-extension-done"))]),
            Step::wait(balance(), BALANCE_TIMEOUT_MS),
        ],
        FlowId::TokenSearch => vec![
            Step::tracked(Selector::test_id("eth-overview-send")),
            Step::wait(Selector::test_id("asset-filter-search-input"), ELEMENT_TIMEOUT_MS),
            Step::TypeChars {
                selector: Selector::test_id("asset-filter-search-input"),
                text: "USDC".to_string(),
                per_char_ms: 150,
            },
            Step::Delay(1000),
            Step::optional(vec![Step::click(Selector::test_id(
                "text-field-search-clear-button",
            ))]),
            Step::TypeChars {
                selector: Selector::test_id("asset-filter-search-input"),
                text: "ETH".to_string(),
                per_char_ms: 150,
            },
            Step::Delay(1000),
            Step::optional(vec![Step::click(Selector::css("button[aria-label=\"Close\"]"))]),
        ],
        FlowId::TokenSend => vec![
            Step::tracked(Selector::test_id("eth-overview-send")),
            Step::wait(Selector::test_id("asset-filter-search-input"), ELEMENT_TIMEOUT_MS),
            Step::tracked(Selector::test_id("multichain-token-list-button")),
            Step::Attempt {
                steps: vec![Step::wait(
                    Selector::test_id("open-recipient-modal-btn"),
                    ELEMENT_TIMEOUT_MS,
                )],
                fallback: vec![Step::wait(Selector::test_id("ens-input"), ELEMENT_TIMEOUT_MS)],
            },
            Step::fill(
                Selector::test_id("ens-input"),
                "0x2f318C334780961FB129D2a6c30D0763d9a5C970",
            ),
            Step::fill(Selector::test_id("currency-input"), "0.001"),
            Step::tracked(Selector::with_text("button", "Continue")),
            Step::wait(Selector::test_id("transaction-confirmation"), ELEMENT_TIMEOUT_MS),
            Step::optional(vec![Step::click(Selector::test_id(
                "wallet-initiated-header-back-button",
            ))]),
        ],
        FlowId::TokensListScrolling => scroll_list(
            tokens_tab(),
            "[data-testid=\"multichain-token-list-item\"]",
        ),
        FlowId::NftListScrolling => scroll_list(nfts_tab(), "[data-testid=\"nft-wrapper\"]"),
    }
}

/// Built-in script for `id`. Onboarding flows have no unlock prelude.
pub fn scripted(id: FlowId, pacing: &Pacing) -> ScriptedFlow {
    let prelude = if id.is_onboarding() {
        Vec::new()
    } else {
        unlock_prelude(pacing)
    };
    ScriptedFlow {
        id,
        prelude,
        body: body(id),
    }
}
