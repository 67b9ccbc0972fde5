//! The saga action catalog.
//!
//! Every step carries exactly one [`StepPayload`]. On the wire the variant is
//! selected by the `action` tag and its fields live under `payload`:
//!
//! ```json
//! {"action": "award_mesos", "payload": {"characterId": 1, "amount": -100, ...}}
//! ```
//!
//! An unknown tag is a decode error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Item granted by `award_inventory`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPayload {
    /// Item template
    pub template_id: u32,
    /// Quantity
    pub quantity: u32,
    /// Lifetime in days, absent or 0 for permanent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<u32>,
    /// Absolute expiration, absent for none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<DateTime<Utc>>,
}

/// `award_inventory` (accepts the legacy tag `award_asset`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardItemPayload {
    /// Recipient
    pub character_id: u32,
    /// Item to award
    pub item: ItemPayload,
}

/// One slice of an experience award.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceDistribution {
    /// Source kind (`WHITE`, `CHAT`, `PARTY`, ...)
    pub experience_type: String,
    /// Amount
    pub amount: u32,
    /// Type-specific attribute
    #[serde(default)]
    pub attr1: u32,
}

/// `award_experience`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardExperiencePayload {
    /// Recipient
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// How the experience is split
    pub distributions: Vec<ExperienceDistribution>,
}

/// `award_level`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardLevelPayload {
    /// Recipient
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Levels to add
    pub amount: u8,
}

/// `award_mesos`. Negative amounts deduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardMesosPayload {
    /// Recipient
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Who pays or grants
    pub actor_id: u32,
    /// Kind of actor (`NPC`, `CHARACTER`, ...)
    pub actor_type: String,
    /// Signed amount
    pub amount: i32,
}

/// `award_currency` (cash-shop currency).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardCurrencyPayload {
    /// Character the request came from
    pub character_id: u32,
    /// Owning account
    pub account_id: u32,
    /// Currency kind
    pub currency_type: u32,
    /// Signed amount
    pub amount: i32,
}

/// `award_fame`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardFamePayload {
    /// Recipient
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Who grants the fame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<u32>,
    /// Kind of actor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_type: Option<String>,
    /// Signed amount
    pub amount: i16,
}

/// `warp_to_random_portal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarpToRandomPortalPayload {
    /// Character to move
    pub character_id: u32,
    /// Target field (`world:channel:map:instance`)
    pub field_id: String,
}

/// `warp_to_portal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarpToPortalPayload {
    /// Character to move
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Target map
    pub map_id: u32,
    /// Map instance, nil for the shared instance
    #[serde(default)]
    pub instance: Uuid,
    /// Target portal
    pub portal_id: u32,
    /// Portal name, preferred over the id when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portal_name: Option<String>,
}

/// `destroy_asset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestroyAssetPayload {
    /// Owner
    pub character_id: u32,
    /// Item template
    pub template_id: u32,
    /// Quantity to remove
    pub quantity: u32,
    /// Remove every stack of the template
    #[serde(default)]
    pub remove_all: bool,
}

/// `equip_asset` / `unequip_asset`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveAssetPayload {
    /// Owner
    pub character_id: u32,
    /// Inventory the asset lives in
    pub inventory_type: u32,
    /// Slot moved from
    pub source: i16,
    /// Slot moved to
    pub destination: i16,
}

/// `change_job`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeJobPayload {
    /// Character
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// New job
    pub job_id: u16,
}

/// `create_skill` / `update_skill`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillPayload {
    /// Character
    pub character_id: u32,
    /// Skill
    pub skill_id: u32,
    /// Current level
    pub level: u8,
    /// Master level
    pub master_level: u8,
    /// Expiration of a timed skill
    pub expiration: DateTime<Utc>,
}

/// One condition checked by `validate_character_state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationCondition {
    /// What to check (`jobId`, `meso`, `item`, `questStatus`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// Comparison (`=`, `>`, `<`, `>=`, `<=`)
    pub operator: String,
    /// Value compared against
    pub value: i32,
    /// Item, quest or skill the condition refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<u32>,
    /// Quest step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// World scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_id: Option<u8>,
    /// Channel scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<u8>,
    /// Count equipped items too
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_equipped: Option<bool>,
}

/// `validate_character_state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCharacterStatePayload {
    /// Character
    pub character_id: u32,
    /// Every condition must hold
    pub conditions: Vec<ValidationCondition>,
}

/// `increase_buddy_capacity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncreaseBuddyCapacityPayload {
    /// Character
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Slots to add
    pub amount: u8,
}

/// `gain_closeness`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GainClosenessPayload {
    /// Pet
    pub pet_id: u32,
    /// Closeness to add
    pub amount: u16,
}

/// `change_hair` / `change_face`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStylePayload {
    /// Character
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// New style
    pub style_id: u32,
    /// Style before the change, used to revert
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_style_id: Option<u32>,
}

/// `change_skin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSkinPayload {
    /// Character
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// New skin
    pub style_id: u8,
    /// Skin before the change, used to revert
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_style_id: Option<u8>,
}

/// `set_hp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetHpPayload {
    /// Character
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// New HP
    pub amount: u16,
}

/// `deduct_experience`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductExperiencePayload {
    /// Character
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Experience to remove
    pub amount: u32,
}

/// `cancel_all_buffs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelAllBuffsPayload {
    /// Character
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Map
    pub map_id: u32,
    /// Map instance
    #[serde(default)]
    pub instance: Uuid,
}

/// `spawn_monster`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnMonsterPayload {
    /// Character that triggered the spawn
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Map
    pub map_id: u32,
    /// Map instance
    #[serde(default)]
    pub instance: Uuid,
    /// Monster template
    pub monster_id: u32,
    /// X position
    pub x: i16,
    /// Y position
    pub y: i16,
    /// Team, -1 for none
    pub team: i8,
    /// Number to spawn
    pub count: u32,
}

/// `start_quest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartQuestPayload {
    /// Character
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Quest
    pub quest_id: u32,
    /// NPC that started it
    pub npc_id: u32,
}

/// `complete_quest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteQuestPayload {
    /// Character
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Quest
    pub quest_id: u32,
    /// NPC that completed it
    pub npc_id: u32,
    /// Skip requirement checks
    #[serde(default)]
    pub force: bool,
}

/// `set_quest_progress`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetQuestProgressPayload {
    /// Character
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Quest
    pub quest_id: u32,
    /// Progress slot
    pub info_number: u32,
    /// Progress value
    pub progress: String,
}

/// `apply_consumable_effect` / `cancel_consumable_effect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumableEffectPayload {
    /// Character
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Consumable item
    pub item_id: u32,
}

/// Chat rendering of `send_message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    /// Yellow notice
    Notice,
    /// Modal popup
    PopUp,
    /// Pink chat line
    PinkText,
    /// Blue chat line
    BlueText,
}

/// `send_message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    /// Recipient
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Rendering
    pub message_type: MessageType,
    /// Text
    pub message: String,
}

/// `show_storage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowStoragePayload {
    /// Character
    pub character_id: u32,
    /// Storage keeper
    pub npc_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Account owning the storage
    pub account_id: u32,
}

/// How reactor drops are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropType {
    /// Drop in place
    Drop,
    /// Spread around the reactor
    Spray,
}

/// `spawn_reactor_drops`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnReactorDropsPayload {
    /// Character that triggered the reactor
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Map
    pub map_id: u32,
    /// Map instance
    #[serde(default)]
    pub instance: Uuid,
    /// Reactor
    pub reactor_id: u32,
    /// Reactor classification
    pub classification: String,
    /// X position
    pub x: i16,
    /// Y position
    pub y: i16,
    /// Layout
    pub drop_type: DropType,
    /// Whether mesos drop
    pub meso: bool,
    /// Meso drop chance
    pub meso_chance: u32,
    /// Minimum meso amount
    pub meso_min: u32,
    /// Maximum meso amount
    pub meso_max: u32,
    /// Minimum number of item drops
    pub min_items: u32,
}

/// `play_portal_sound`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayPortalSoundPayload {
    /// Character
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
}

/// `update_area_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAreaInfoPayload {
    /// Character
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Area
    pub area: u16,
    /// Info string
    pub info: String,
}

/// `show_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowInfoPayload {
    /// Character
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Effect path
    pub path: String,
}

/// `show_info_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowInfoTextPayload {
    /// Character
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Text
    pub text: String,
}

/// `show_hint`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowHintPayload {
    /// Character
    pub character_id: u32,
    /// World
    pub world_id: u8,
    /// Channel
    pub channel_id: u8,
    /// Hint text
    pub hint: String,
    /// Box width
    pub width: u16,
    /// Box height
    pub height: u16,
}

/// `block_portal` / `unblock_portal`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalBlockPayload {
    /// Character the block applies to
    pub character_id: u32,
    /// Map
    pub map_id: u32,
    /// Portal
    pub portal_id: u32,
}

macro_rules! catalog {
    ($($(#[$meta:meta])* $variant:ident($payload:ty) => $tag:literal $(| $alias:literal)?),+ $(,)?) => {
        /// Typed step payload selected by the action tag.
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(tag = "action", content = "payload")]
        pub enum StepPayload {
            $(
                $(#[$meta])*
                #[serde(rename = $tag $(, alias = $alias)?)]
                $variant($payload),
            )+
        }

        impl StepPayload {
            /// The action tag.
            #[must_use]
            pub const fn action(&self) -> &'static str {
                match self {
                    $(Self::$variant(_) => $tag,)+
                }
            }
        }

        /// Every action tag, in catalog order.
        pub const ACTIONS: &[&str] = &[$($tag),+];
    };
}

catalog! {
    /// Grant an item
    AwardInventory(AwardItemPayload) => "award_inventory" | "award_asset",
    /// Grant experience
    AwardExperience(AwardExperiencePayload) => "award_experience",
    /// Grant levels
    AwardLevel(AwardLevelPayload) => "award_level",
    /// Grant or deduct mesos
    AwardMesos(AwardMesosPayload) => "award_mesos",
    /// Grant or deduct cash currency
    AwardCurrency(AwardCurrencyPayload) => "award_currency",
    /// Grant or deduct fame
    AwardFame(AwardFamePayload) => "award_fame",
    /// Warp to a random portal in a field
    WarpToRandomPortal(WarpToRandomPortalPayload) => "warp_to_random_portal",
    /// Warp to a named or numbered portal
    WarpToPortal(WarpToPortalPayload) => "warp_to_portal",
    /// Remove items
    DestroyAsset(DestroyAssetPayload) => "destroy_asset",
    /// Equip an item
    EquipAsset(MoveAssetPayload) => "equip_asset",
    /// Unequip an item
    UnequipAsset(MoveAssetPayload) => "unequip_asset",
    /// Change job
    ChangeJob(ChangeJobPayload) => "change_job",
    /// Learn a skill
    CreateSkill(SkillPayload) => "create_skill",
    /// Change a skill's level
    UpdateSkill(SkillPayload) => "update_skill",
    /// Guard the remaining steps with conditions
    ValidateCharacterState(ValidateCharacterStatePayload) => "validate_character_state",
    /// Add buddy list slots
    IncreaseBuddyCapacity(IncreaseBuddyCapacityPayload) => "increase_buddy_capacity",
    /// Add pet closeness
    GainCloseness(GainClosenessPayload) => "gain_closeness",
    /// Change hair
    ChangeHair(ChangeStylePayload) => "change_hair",
    /// Change face
    ChangeFace(ChangeStylePayload) => "change_face",
    /// Change skin
    ChangeSkin(ChangeSkinPayload) => "change_skin",
    /// Set HP
    SetHp(SetHpPayload) => "set_hp",
    /// Remove experience
    DeductExperience(DeductExperiencePayload) => "deduct_experience",
    /// Cancel every buff
    CancelAllBuffs(CancelAllBuffsPayload) => "cancel_all_buffs",
    /// Spawn monsters
    SpawnMonster(SpawnMonsterPayload) => "spawn_monster",
    /// Start a quest
    StartQuest(StartQuestPayload) => "start_quest",
    /// Complete a quest
    CompleteQuest(CompleteQuestPayload) => "complete_quest",
    /// Record quest progress
    SetQuestProgress(SetQuestProgressPayload) => "set_quest_progress",
    /// Apply a consumable's effect
    ApplyConsumableEffect(ConsumableEffectPayload) => "apply_consumable_effect",
    /// Cancel a consumable's effect
    CancelConsumableEffect(ConsumableEffectPayload) => "cancel_consumable_effect",
    /// Send a chat message
    SendMessage(SendMessagePayload) => "send_message",
    /// Open account storage
    ShowStorage(ShowStoragePayload) => "show_storage",
    /// Spawn reactor drops
    SpawnReactorDrops(SpawnReactorDropsPayload) => "spawn_reactor_drops",
    /// Play the portal sound
    PlayPortalSound(PlayPortalSoundPayload) => "play_portal_sound",
    /// Update area info
    UpdateAreaInfo(UpdateAreaInfoPayload) => "update_area_info",
    /// Show an info effect
    ShowInfo(ShowInfoPayload) => "show_info",
    /// Show info text
    ShowInfoText(ShowInfoTextPayload) => "show_info_text",
    /// Show a hint box
    ShowHint(ShowHintPayload) => "show_hint",
    /// Block a portal for a character
    BlockPortal(PortalBlockPayload) => "block_portal",
    /// Unblock a portal for a character
    UnblockPortal(PortalBlockPayload) => "unblock_portal",
}

impl StepPayload {
    /// Decode a payload from its tag and raw JSON body.
    ///
    /// # Errors
    ///
    /// Fails on unknown tags or when the body does not match the tag's shape.
    pub fn decode(action: &str, payload: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(serde_json::json!({ "action": action, "payload": payload }))
    }

    /// Split into tag and raw JSON body.
    ///
    /// # Errors
    ///
    /// Fails only if a payload cannot be represented as JSON.
    pub fn encode(&self) -> serde_json::Result<(&'static str, serde_json::Value)> {
        let mut tagged = serde_json::to_value(self)?;
        let payload = tagged
            .get_mut("payload")
            .map(serde_json::Value::take)
            .unwrap_or_default();
        Ok((self.action(), payload))
    }

    /// The action that undoes this one, when the catalog defines it.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        match self {
            Self::AwardInventory(p) => Some(Self::DestroyAsset(DestroyAssetPayload {
                character_id: p.character_id,
                template_id: p.item.template_id,
                quantity: p.item.quantity,
                remove_all: false,
            })),
            Self::AwardMesos(p) => Some(Self::AwardMesos(AwardMesosPayload {
                amount: p.amount.saturating_neg(),
                ..p.clone()
            })),
            Self::AwardCurrency(p) => Some(Self::AwardCurrency(AwardCurrencyPayload {
                amount: p.amount.saturating_neg(),
                ..p.clone()
            })),
            Self::AwardFame(p) => Some(Self::AwardFame(AwardFamePayload {
                amount: p.amount.saturating_neg(),
                ..p.clone()
            })),
            Self::EquipAsset(p) => Some(Self::UnequipAsset(MoveAssetPayload {
                source: p.destination,
                destination: p.source,
                ..p.clone()
            })),
            Self::UnequipAsset(p) => Some(Self::EquipAsset(MoveAssetPayload {
                source: p.destination,
                destination: p.source,
                ..p.clone()
            })),
            Self::ChangeHair(p) => p.old_style_id.map(|old| Self::ChangeHair(revert_style(p, old))),
            Self::ChangeFace(p) => p.old_style_id.map(|old| Self::ChangeFace(revert_style(p, old))),
            Self::ChangeSkin(p) => p.old_style_id.map(|old| {
                Self::ChangeSkin(ChangeSkinPayload {
                    style_id: old,
                    old_style_id: Some(p.style_id),
                    ..p.clone()
                })
            }),
            Self::ApplyConsumableEffect(p) => Some(Self::CancelConsumableEffect(p.clone())),
            Self::BlockPortal(p) => Some(Self::UnblockPortal(p.clone())),
            Self::UnblockPortal(p) => Some(Self::BlockPortal(p.clone())),
            _ => None,
        }
    }

    /// Character the step acts on, if any.
    #[must_use]
    pub const fn character_id(&self) -> Option<u32> {
        match self {
            Self::AwardInventory(p) => Some(p.character_id),
            Self::AwardExperience(p) => Some(p.character_id),
            Self::AwardLevel(p) => Some(p.character_id),
            Self::AwardMesos(p) => Some(p.character_id),
            Self::AwardCurrency(p) => Some(p.character_id),
            Self::AwardFame(p) => Some(p.character_id),
            Self::WarpToRandomPortal(p) => Some(p.character_id),
            Self::WarpToPortal(p) => Some(p.character_id),
            Self::DestroyAsset(p) => Some(p.character_id),
            Self::EquipAsset(p) | Self::UnequipAsset(p) => Some(p.character_id),
            Self::ChangeJob(p) => Some(p.character_id),
            Self::CreateSkill(p) | Self::UpdateSkill(p) => Some(p.character_id),
            Self::ValidateCharacterState(p) => Some(p.character_id),
            Self::IncreaseBuddyCapacity(p) => Some(p.character_id),
            Self::GainCloseness(_) => None,
            Self::ChangeHair(p) | Self::ChangeFace(p) => Some(p.character_id),
            Self::ChangeSkin(p) => Some(p.character_id),
            Self::SetHp(p) => Some(p.character_id),
            Self::DeductExperience(p) => Some(p.character_id),
            Self::CancelAllBuffs(p) => Some(p.character_id),
            Self::SpawnMonster(p) => Some(p.character_id),
            Self::StartQuest(p) => Some(p.character_id),
            Self::CompleteQuest(p) => Some(p.character_id),
            Self::SetQuestProgress(p) => Some(p.character_id),
            Self::ApplyConsumableEffect(p) | Self::CancelConsumableEffect(p) => Some(p.character_id),
            Self::SendMessage(p) => Some(p.character_id),
            Self::ShowStorage(p) => Some(p.character_id),
            Self::SpawnReactorDrops(p) => Some(p.character_id),
            Self::PlayPortalSound(p) => Some(p.character_id),
            Self::UpdateAreaInfo(p) => Some(p.character_id),
            Self::ShowInfo(p) => Some(p.character_id),
            Self::ShowInfoText(p) => Some(p.character_id),
            Self::ShowHint(p) => Some(p.character_id),
            Self::BlockPortal(p) | Self::UnblockPortal(p) => Some(p.character_id),
        }
    }
}

fn revert_style(p: &ChangeStylePayload, old: u32) -> ChangeStylePayload {
    ChangeStylePayload {
        style_id: old,
        old_style_id: Some(p.style_id),
        ..p.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mesos(amount: i32) -> StepPayload {
        StepPayload::AwardMesos(AwardMesosPayload {
            character_id: 7,
            world_id: 0,
            channel_id: 1,
            actor_id: 9_000_000,
            actor_type: "NPC".into(),
            amount,
        })
    }

    #[test]
    fn tag_selects_payload() {
        let decoded = StepPayload::decode(
            "award_level",
            json!({"characterId": 1, "worldId": 0, "channelId": 2, "amount": 3}),
        )
        .unwrap();
        assert_eq!(
            decoded,
            StepPayload::AwardLevel(AwardLevelPayload {
                character_id: 1,
                world_id: 0,
                channel_id: 2,
                amount: 3
            })
        );
    }

    #[test]
    fn legacy_award_asset_tag_is_accepted() {
        let decoded = StepPayload::decode(
            "award_asset",
            json!({"characterId": 1, "item": {"templateId": 2000000, "quantity": 5}}),
        )
        .unwrap();
        assert_eq!(decoded.action(), "award_inventory");
    }

    #[test]
    fn unknown_tag_fails() {
        assert!(StepPayload::decode("summon_dragon", json!({})).is_err());
    }

    #[test]
    fn shape_mismatch_fails() {
        assert!(StepPayload::decode("award_level", json!({"characterId": "x"})).is_err());
    }

    #[test]
    fn encode_splits_tag_and_body() {
        let (action, body) = mesos(-10).encode().unwrap();
        assert_eq!(action, "award_mesos");
        assert_eq!(body["amount"], -10);
        assert_eq!(body["actorType"], "NPC");
    }

    #[test]
    fn catalog_tags_are_unique() {
        let mut tags = ACTIONS.to_vec();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), ACTIONS.len());
    }

    #[test]
    fn inverses() {
        assert_eq!(mesos(100).inverse(), Some(mesos(-100)));
        assert_eq!(mesos(i32::MIN).inverse(), Some(mesos(i32::MAX)));

        let equip = StepPayload::EquipAsset(MoveAssetPayload {
            character_id: 1,
            inventory_type: 1,
            source: 5,
            destination: -11,
        });
        let Some(StepPayload::UnequipAsset(undo)) = equip.inverse() else {
            unreachable!("equip inverts to unequip");
        };
        assert_eq!((undo.source, undo.destination), (-11, 5));

        let hair = StepPayload::ChangeHair(ChangeStylePayload {
            character_id: 1,
            world_id: 0,
            channel_id: 0,
            style_id: 30_030,
            old_style_id: None,
        });
        assert_eq!(hair.inverse(), None);

        let warp = StepPayload::WarpToRandomPortal(WarpToRandomPortalPayload {
            character_id: 1,
            field_id: "0:1:100000000:00000000-0000-0000-0000-000000000000".into(),
        });
        assert_eq!(warp.inverse(), None);
    }

    #[test]
    fn message_and_drop_enums_use_wire_names() {
        assert_eq!(serde_json::to_value(MessageType::PinkText).unwrap(), "PINK_TEXT");
        assert_eq!(serde_json::to_value(DropType::Spray).unwrap(), "spray");
    }
}
