//! Transaction Classification
//!
//! Tags mempool transactions with the application or on-chain action they belong to.
//! Four rule families run in a fixed order, each able to overwrite the previous one:
//! message metadata, output addresses, stake addresses, then certificates.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::metadata::first_message_line;
use crate::source::{Certificate, DecodedTx};

/// Known applications and on-chain actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Dexhunter,
    DripDropz,
    Indigo,
    JpgStore,
    Liqwid,
    Minswap,
    Optim,
    Spectrum,
    Sundae,
    SealVm,
    Wingriders,
    /// Stake key registration, deregistration or delegation
    Stake,
    /// Stake pool registration or retirement
    Pool,
    /// Governance action: vote delegation, committee or DRep certificates
    Governance,
}

impl Category {
    /// Every category, in legend order
    pub const ALL: [Category; 14] = [
        Category::Dexhunter,
        Category::DripDropz,
        Category::Indigo,
        Category::JpgStore,
        Category::Liqwid,
        Category::Minswap,
        Category::Optim,
        Category::Spectrum,
        Category::Sundae,
        Category::SealVm,
        Category::Wingriders,
        Category::Stake,
        Category::Pool,
        Category::Governance,
    ];

    /// Glyph shown in the icon column
    pub fn glyph(&self) -> &'static str {
        match self {
            Category::Dexhunter => "🏹",
            Category::DripDropz => "🚰",
            // trailing space: the eye renders one column wide
            Category::Indigo => "👁️ ",
            Category::JpgStore => "🦛",
            Category::Liqwid => "💧",
            Category::Minswap => "🐱",
            Category::Optim => "🅾️",
            Category::Spectrum => "🌈",
            Category::Sundae => "🍨",
            Category::SealVm => "🦭",
            Category::Wingriders => "🦸",
            Category::Stake => "🥩",
            Category::Pool => "🏊",
            Category::Governance => "🏛️",
        }
    }

    /// Human-readable name used in the legend
    pub fn name(&self) -> &'static str {
        match self {
            Category::Dexhunter => "Dexhunter",
            Category::DripDropz => "DripDropz",
            Category::Indigo => "Indigo",
            Category::JpgStore => "JPGstore",
            Category::Liqwid => "Liqwid",
            Category::Minswap => "Minswap",
            Category::Optim => "Optim",
            Category::Spectrum => "Spectrum",
            Category::Sundae => "Sundae",
            Category::SealVm => "SealVM",
            Category::Wingriders => "Wingriders",
            Category::Stake => "Staking",
            Category::Pool => "Pools",
            Category::Governance => "Governance",
        }
    }
}

/// Certificate groups the classifier recognises
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateGroup {
    Stake,
    Pool,
    Governance,
}

impl CertificateGroup {
    pub fn category(self) -> Category {
        match self {
            CertificateGroup::Stake => Category::Stake,
            CertificateGroup::Pool => Category::Pool,
            CertificateGroup::Governance => Category::Governance,
        }
    }
}

impl Certificate {
    /// Group this certificate kind belongs to, if any
    pub fn group(&self) -> Option<CertificateGroup> {
        use Certificate::*;
        match self {
            StakeRegistration
            | StakeDeregistration
            | StakeDelegation
            | Registration
            | Unregistration
            | StakeRegistrationDelegation => Some(CertificateGroup::Stake),
            PoolRegistration | PoolRetirement => Some(CertificateGroup::Pool),
            VoteDelegation
            | StakeVoteDelegation
            | VoteRegistrationDelegation
            | StakeVoteRegistrationDelegation
            | AuthCommitteeHot
            | ResignCommitteeCold
            | RegDrep
            | UnregDrep
            | UpdateDrep => Some(CertificateGroup::Governance),
            GenesisKeyDelegation | MoveInstantaneousRewards => None,
        }
    }

    pub fn category(&self) -> Option<Category> {
        self.group().map(CertificateGroup::category)
    }
}

/// First lines of CIP-20 messages posted by known applications
static MESSAGES: LazyLock<HashMap<&'static str, Category>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    map.insert("Dexhunter Trade", Category::Dexhunter);
    for msg in [
        "Minswap: Deposit Order",
        "Minswap: Cancel Order",
        "Minswap: Launch Bowl Redemption",
        "Minswap: LBE Deposit ADA",
        "Minswap: MasterChef",
        "Minswap: Order Executed",
        "Minswap: Swap Exact In Order",
        "Minswap: Swap Exact In Limit Order",
        "Minswap: Swap Exact Out Order",
        "Minswap: Swap Exact Out Limit Order",
        "Minswap: V2 Harvest reward",
        "Minswap: V2 Stake liquidity",
        "Minswap: Withdraw Order",
        "Minswap: Zap Order",
    ] {
        map.insert(msg, Category::Minswap);
    }
    map.insert("SSP: Swap Request", Category::Sundae);
    map
});

/// Script and payment addresses of known applications
static ADDRESSES: LazyLock<HashMap<&'static str, Category>> = LazyLock::new(|| {
    let table: &[(&str, Category)] = &[
        ("addr1v8pr9mwnqarw808gtllvmlxvk70hnszrukjeqfstr9t9g5crud8c4", Category::DripDropz),
        ("addr1w80ptp0qgmcklhmeweesqgeurtlma8fsxsr9dt8au30fzss0czhl9", Category::Indigo),
        ("addr1w92w34pys9h4h02zxdfsp8lhcvdd5t9aaln9z96szsgh73scty4aj", Category::Indigo),
        ("addr1w8q673nyx6vtcules4aqess7e9yuu6geja95xhg90hzy3wqpsjzzz", Category::Indigo),
        ("addr1wxj88juwkzmpcqacd9hua2cur2yl50kgx3tjs588c2470qc2ftfae", Category::Indigo),
        (
            "addr1zxgx3far7qygq0k6epa0zcvcvrevmn0ypsnfsue94nsn3tvpw288a4x0xf8pxgcntelxmyclq83s0ykeehchz2wtspks905plm",
            Category::JpgStore,
        ),
        ("addr1wx6htk5hfmr4dw32lhxdcp7t6xpe4jhs5fxylq90mqwnldsvr87c6", Category::Liqwid),
        ("addr1wyn2aflq8ff7xaxpmqk9vz53ks28hz256tkyaj739rsvrrq3u5ft3", Category::Liqwid),
        ("addr1w8arvq7j9qlrmt0wpdvpp7h4jr4fmfk8l653p9t907v2nsss7w7r4", Category::Liqwid),
        (
            "addr1zywj8y96k38kye7qz329dhp0t782ykr0ev92mtz4yhv6gph8ucsr8rpyzewcf9jyf7gmjj052dednasdeznehw7aqc7q0z7vn2",
            Category::Optim,
        ),
        ("addr1wyr4uz0tp75fu8wrg6gm83t20aphuc9vt6n8kvu09ctkugqpsrmeh", Category::Spectrum),
        (
            "addr1x94ec3t25egvhqy2n265xfhq882jxhkknurfe9ny4rl9k6dj764lvrxdayh2ux30fl0ktuh27csgmpevdu89jlxppvrst84slu",
            Category::Spectrum,
        ),
        (
            "addr1x8nz307k3sr60gu0e47cmajssy4fmld7u493a4xztjrll0aj764lvrxdayh2ux30fl0ktuh27csgmpevdu89jlxppvrswgxsta",
            Category::Spectrum,
        ),
        ("addr1wynp362vmvr8jtc946d3a3utqgclfdl5y9d3kn849e359hsskr20n", Category::Spectrum),
        ("addr1wxaptpmxcxawvr3pzlhgnpmzz3ql43n2tc8mn3av5kx0yzs09tqh8", Category::Sundae),
        ("addr1w9qzpelu9hn45pefc0xr4ac4kdxeswq7pndul2vuj59u8tqaxdznu", Category::Sundae),
        ("addr1w9jx45flh83z6wuqypyash54mszwmdj8r64fydafxtfc6jgrw4rm3", Category::Sundae),
        ("addr1wxr2a8htmzuhj39y2gq7ftkpxv98y2g67tg8zezthgq4jkg0a4ul4", Category::Wingriders),
    ];
    table.iter().copied().collect()
});

/// Stake addresses of known applications
static STAKE_ADDRESSES: LazyLock<HashMap<&'static str, Category>> = LazyLock::new(|| {
    let mut map = HashMap::new();
    map.insert(
        "stake1u8ffzkegp8h48mare3g3ntf3xmjce3jqptsdtj38ee3yh3c9t4uum",
        Category::SealVm,
    );
    map
});

/// Look up the category for a CIP-20 message first line
pub fn message_category(line: &str) -> Option<Category> {
    MESSAGES.get(line).copied()
}

/// Look up the category for an output address
pub fn address_category(address: &str) -> Option<Category> {
    ADDRESSES.get(address).copied()
}

/// Look up the category for a stake address
pub fn stake_address_category(stake_address: &str) -> Option<Category> {
    STAKE_ADDRESSES.get(stake_address).copied()
}

/// Classify a decoded transaction
///
/// # Arguments
/// * `tx` - The decoded transaction
///
/// # Returns
/// The winning category, or `None` when no rule matches
pub fn classify(tx: &DecodedTx) -> Option<Category> {
    let mut category = None;

    if let Some(line) = tx.metadata.as_deref().and_then(first_message_line) {
        if let Some(found) = message_category(&line) {
            category = Some(found);
        }
    }

    // Last matching output wins.
    for output in &tx.outputs {
        if let Some(found) = address_category(&output.address) {
            category = Some(found);
        }
    }

    for output in &tx.outputs {
        if let Some(found) = output.stake_address.as_deref().and_then(stake_address_category) {
            category = Some(found);
        }
    }

    // First recognised certificate wins and ends the scan.
    for cert in &tx.certificates {
        if let Some(found) = cert.category() {
            category = Some(found);
            break;
        }
    }

    category
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::encode_message;
    use crate::source::TxOutput;

    const SUNDAE_ADDR: &str = "addr1wxaptpmxcxawvr3pzlhgnpmzz3ql43n2tc8mn3av5kx0yzs09tqh8";
    const LIQWID_ADDR: &str = "addr1wx6htk5hfmr4dw32lhxdcp7t6xpe4jhs5fxylq90mqwnldsvr87c6";
    const SEAL_STAKE: &str = "stake1u8ffzkegp8h48mare3g3ntf3xmjce3jqptsdtj38ee3yh3c9t4uum";
    const PLAIN_ADDR: &str = "addr1qxplainwalletaddress";

    fn tx_with_message(line: &str) -> DecodedTx {
        DecodedTx {
            hash: "aa".to_string(),
            metadata: Some(encode_message(&[line]).unwrap()),
            ..Default::default()
        }
    }

    // ==================== Table lookup tests ====================

    #[test]
    fn test_message_table() {
        assert_eq!(message_category("Dexhunter Trade"), Some(Category::Dexhunter));
        assert_eq!(message_category("Minswap: MasterChef"), Some(Category::Minswap));
        assert_eq!(message_category("SSP: Swap Request"), Some(Category::Sundae));
        assert_eq!(message_category("dexhunter trade"), None);
    }

    #[test]
    fn test_all_minswap_messages_present() {
        let minswap = MESSAGES.values().filter(|c| **c == Category::Minswap).count();
        assert_eq!(minswap, 14);
    }

    #[test]
    fn test_address_table() {
        assert_eq!(address_category(SUNDAE_ADDR), Some(Category::Sundae));
        assert_eq!(address_category(LIQWID_ADDR), Some(Category::Liqwid));
        assert_eq!(address_category(PLAIN_ADDR), None);
        assert_eq!(ADDRESSES.len(), 18);
    }

    #[test]
    fn test_stake_address_table() {
        assert_eq!(stake_address_category(SEAL_STAKE), Some(Category::SealVm));
        assert_eq!(stake_address_category("stake1unknown"), None);
    }

    // ==================== Certificate grouping tests ====================

    #[test]
    fn test_certificate_groups() {
        assert_eq!(Certificate::StakeDelegation.group(), Some(CertificateGroup::Stake));
        assert_eq!(Certificate::Registration.group(), Some(CertificateGroup::Stake));
        assert_eq!(Certificate::PoolRetirement.group(), Some(CertificateGroup::Pool));
        assert_eq!(Certificate::PoolRegistration.category(), Some(Category::Pool));
        assert_eq!(Certificate::VoteDelegation.group(), Some(CertificateGroup::Governance));
        assert_eq!(Certificate::AuthCommitteeHot.category(), Some(Category::Governance));
        assert_eq!(Certificate::UpdateDrep.category(), Some(Category::Governance));
        assert_eq!(Certificate::GenesisKeyDelegation.group(), None);
        assert_eq!(Certificate::MoveInstantaneousRewards.category(), None);
    }

    // ==================== Family tests ====================

    #[test]
    fn test_no_rules_match() {
        let tx = DecodedTx {
            hash: "aa".to_string(),
            outputs: vec![TxOutput::new(PLAIN_ADDR)],
            ..Default::default()
        };
        assert_eq!(classify(&tx), None);
    }

    #[test]
    fn test_metadata_family() {
        assert_eq!(classify(&tx_with_message("Dexhunter Trade")), Some(Category::Dexhunter));
        assert_eq!(classify(&tx_with_message("hello world")), None);
    }

    #[test]
    fn test_only_first_message_line_counts() {
        let tx = DecodedTx {
            metadata: Some(encode_message(&["gm", "Dexhunter Trade"]).unwrap()),
            ..Default::default()
        };
        assert_eq!(classify(&tx), None);
    }

    #[test]
    fn test_undecodable_metadata_is_ignored() {
        let tx = DecodedTx {
            metadata: Some(vec![0xff, 0xff]),
            outputs: vec![TxOutput::new(SUNDAE_ADDR)],
            ..Default::default()
        };
        assert_eq!(classify(&tx), Some(Category::Sundae));
    }

    #[test]
    fn test_address_overrides_metadata() {
        let mut tx = tx_with_message("Dexhunter Trade");
        tx.outputs = vec![TxOutput::new(LIQWID_ADDR)];
        assert_eq!(classify(&tx), Some(Category::Liqwid));
    }

    #[test]
    fn test_last_matching_output_wins() {
        let tx = DecodedTx {
            outputs: vec![
                TxOutput::new(SUNDAE_ADDR),
                TxOutput::new(PLAIN_ADDR),
                TxOutput::new(LIQWID_ADDR),
                TxOutput::new(PLAIN_ADDR),
            ],
            ..Default::default()
        };
        assert_eq!(classify(&tx), Some(Category::Liqwid));
    }

    #[test]
    fn test_stake_address_overrides_outputs() {
        let tx = DecodedTx {
            outputs: vec![
                TxOutput::with_stake(PLAIN_ADDR, SEAL_STAKE),
                TxOutput::new(SUNDAE_ADDR),
            ],
            ..Default::default()
        };
        assert_eq!(classify(&tx), Some(Category::SealVm));
    }

    #[test]
    fn test_certificate_overrides_metadata() {
        let mut tx = tx_with_message("Minswap: Swap Exact In Order");
        tx.certificates = vec![Certificate::PoolRetirement];
        assert_eq!(classify(&tx), Some(Category::Pool));
    }

    #[test]
    fn test_certificate_overrides_every_family() {
        let tx = DecodedTx {
            metadata: Some(encode_message(&["Dexhunter Trade"]).unwrap()),
            outputs: vec![TxOutput::with_stake(SUNDAE_ADDR, SEAL_STAKE)],
            certificates: vec![Certificate::VoteDelegation],
            ..Default::default()
        };
        assert_eq!(classify(&tx), Some(Category::Governance));
    }

    #[test]
    fn test_first_recognised_certificate_wins() {
        let tx = DecodedTx {
            certificates: vec![
                Certificate::MoveInstantaneousRewards,
                Certificate::StakeRegistration,
                Certificate::PoolRegistration,
            ],
            ..Default::default()
        };
        assert_eq!(classify(&tx), Some(Category::Stake));
    }

    #[test]
    fn test_unrecognised_certificates_keep_earlier_category() {
        let tx = DecodedTx {
            outputs: vec![TxOutput::new(SUNDAE_ADDR)],
            certificates: vec![Certificate::GenesisKeyDelegation],
            ..Default::default()
        };
        assert_eq!(classify(&tx), Some(Category::Sundae));
    }

    // ==================== Category tests ====================

    #[test]
    fn test_every_category_has_glyph_and_name() {
        for category in Category::ALL {
            assert!(!category.glyph().is_empty());
            assert!(!category.name().is_empty());
        }
    }
}
