//! Script model to CSS state machine.
//!
//! The page holds one element per state, followed by one element per
//! background and per character (emotes nest inside their character). Exactly
//! one state is visible at a time:
//!
//! - a state is visible while it is the `:target`;
//! - the initial state is moved to the end of the document and is visible when
//!   no other state is targeted, since no fragment means no target.
//!
//! Everything else follows from *activation classes*. Each background,
//! character and emote gets a class that is placed on every state showing it,
//! so `.{activation}:target ~ #{element}` switches the element on. Animations
//! work the same way, one activation class per character and animation.
//!
//! The walk over the script hands out [`UniqueId`]s for everything it finds.
//! Only once the whole model is known are they turned into short names, state
//! ids first, so the output stays as small as the identifiers allow.

use std::collections::HashMap;

use thiserror::Error;

use crate::identifier::{IdentifierAllocator, UniqueId, UniqueIdSource};
use crate::model::{Interaction, MapScript, Presence};
use crate::path::SourcePath;
use crate::runs::convert_runs_to_html;
use crate::web::{
    ElementAttributes, WebBackground, WebCharacter, WebData, WebEmote, WebInteraction,
    WebMenuOption, WebState,
};

/// Output of [`transpile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transpiled {
    pub data: WebData,
    /// State machine rules, in the indented stylesheet syntax.
    pub css_fragment: String,
    /// Every SVG the page inlines, each listed once.
    pub asset_paths: Vec<SourcePath>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranspileError {
    #[error("script has no states")]
    NoStates,

    #[error("state {state} describes {found} characters but {declared} are declared")]
    PresenceMismatch {
        state: usize,
        found: usize,
        declared: usize,
    },

    #[error("state {state} links to state {target}, but there are only {count} states")]
    TargetOutOfRange {
        state: usize,
        target: usize,
        count: usize,
    },
}

// ---------------------------------------------------------------------------
// Temporary entities
// ---------------------------------------------------------------------------

/// Entities of one kind, deduplicated by normalized name, in discovery order.
#[derive(Debug)]
struct Registry<T> {
    entries: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> Registry<T> {
    fn find_or_insert_with(&mut self, key: &str, create: impl FnOnce() -> T) -> &mut T {
        let position = match self.index.get(key) {
            Some(&position) => position,
            None => {
                self.entries.push(create());
                self.index.insert(key.to_string(), self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[position]
    }

    fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }
}

#[derive(Debug)]
struct TempBackground {
    normalized: String,
    id: UniqueId,
    activation: UniqueId,
    initial: bool,
}

#[derive(Debug)]
struct TempAnimation {
    normalized: String,
    activation: UniqueId,
    initial: bool,
}

#[derive(Debug)]
struct TempEmote {
    normalized: String,
    id: UniqueId,
    activation: UniqueId,
    initial: bool,
}

#[derive(Debug)]
struct TempCharacter {
    slot: usize,
    id: UniqueId,
    presence: UniqueId,
    initial: bool,
    entries: Registry<TempAnimation>,
    exits: Registry<TempAnimation>,
    emotes: Registry<TempEmote>,
}

#[derive(Debug)]
enum TempInteraction {
    Dismiss { target: usize },
    Menu { options: Vec<(String, usize)> },
}

#[derive(Debug)]
struct TempState {
    id: UniqueId,
    classes: Vec<UniqueId>,
    line: Option<String>,
    speakers: Option<Vec<String>>,
    interaction: TempInteraction,
}

/// Class keys shared by every element of one kind. Allocated on first need so
/// scripts without, say, backgrounds never spend a name on them.
#[derive(Debug, Default)]
struct SharedClasses {
    background: Option<UniqueId>,
    character: Option<UniqueId>,
    emote: Option<UniqueId>,
}

// ---------------------------------------------------------------------------
// Transpile
// ---------------------------------------------------------------------------

/// Compiles a mapped script into web data, a CSS fragment and asset paths.
pub fn transpile(script: &MapScript) -> Result<Transpiled, TranspileError> {
    let count = script.states.len();
    if count == 0 {
        return Err(TranspileError::NoStates);
    }

    let display_names: HashMap<&str, &str> = script
        .characters
        .iter()
        .map(|c| (c.normalized.as_str(), c.verbatim.as_str()))
        .collect();

    let mut uids = UniqueIdSource::new();
    let state_class = uids.next();
    let mut shared = SharedClasses::default();

    let mut backgrounds: Registry<TempBackground> = Registry::default();
    let mut characters: Registry<TempCharacter> = Registry::default();
    let mut entry_names: Vec<String> = Vec::new();
    let mut exit_names: Vec<String> = Vec::new();
    let mut states: Vec<TempState> = Vec::with_capacity(count);

    for (index, state) in script.states.iter().enumerate() {
        let initial = index == 0;
        let mut classes = vec![state_class];

        if let Some(name) = &state.background {
            shared.background.get_or_insert_with(|| uids.next());
            let background = backgrounds.find_or_insert_with(name, || TempBackground {
                normalized: name.clone(),
                id: uids.next(),
                activation: uids.next(),
                initial: false,
            });
            background.initial |= initial;
            classes.push(background.activation);
        }

        if state.characters.len() != script.characters.len() {
            return Err(TranspileError::PresenceMismatch {
                state: index,
                found: state.characters.len(),
                declared: script.characters.len(),
            });
        }

        for (slot, presence) in state.characters.iter().enumerate() {
            let Some(emote_name) = presence.emote() else {
                continue;
            };

            shared.character.get_or_insert_with(|| uids.next());
            let declared = &script.characters[slot];
            let character = characters.find_or_insert_with(&declared.normalized, || TempCharacter {
                slot,
                id: uids.next(),
                presence: uids.next(),
                initial: false,
                entries: Registry::default(),
                exits: Registry::default(),
                emotes: Registry::default(),
            });
            character.initial |= initial;
            classes.push(character.presence);

            let animation = match presence {
                Presence::Entering { animation, .. } => {
                    Some((&mut character.entries, &mut entry_names, animation))
                }
                Presence::Exiting { animation, .. } => {
                    Some((&mut character.exits, &mut exit_names, animation))
                }
                Presence::Present { .. } | Presence::NotPresent => None,
            };
            if let Some((registry, names, animation)) = animation {
                let entity = registry.find_or_insert_with(animation, || TempAnimation {
                    normalized: animation.clone(),
                    activation: uids.next(),
                    initial: false,
                });
                entity.initial |= initial;
                classes.push(entity.activation);
                if !names.contains(animation) {
                    names.push(animation.clone());
                }
            }

            shared.emote.get_or_insert_with(|| uids.next());
            let emote = character.emotes.find_or_insert_with(emote_name, || TempEmote {
                normalized: emote_name.to_string(),
                id: uids.next(),
                activation: uids.next(),
                initial: false,
            });
            emote.initial |= initial;
            classes.push(emote.activation);
        }

        let mut speakers: Vec<String> = state
            .speakers
            .iter()
            .filter_map(|speaker| display_names.get(speaker.as_str()))
            .map(|display| display.to_string())
            .collect();
        speakers.sort();
        speakers.dedup();

        let check = |target: usize| {
            if target < count {
                Ok(target)
            } else {
                Err(TranspileError::TargetOutOfRange {
                    state: index,
                    target,
                    count,
                })
            }
        };

        let interaction = match &state.interaction {
            Interaction::Dismiss { state_index } => TempInteraction::Dismiss {
                target: check(*state_index)?,
            },
            Interaction::Menu { options } => TempInteraction::Menu {
                options: options
                    .iter()
                    .map(|option| {
                        Ok((convert_runs_to_html(&option.content), check(option.state_index)?))
                    })
                    .collect::<Result<_, TranspileError>>()?,
            },
        };

        states.push(TempState {
            id: uids.next(),
            classes,
            line: state.line.as_deref().map(convert_runs_to_html),
            speakers: if speakers.is_empty() { None } else { Some(speakers) },
            interaction,
        });
    }

    // Initial state last; every target index follows it.
    states.rotate_left(1);
    let remap = |target: usize| if target == 0 { count - 1 } else { target - 1 };

    let mut class_names = IdentifierAllocator::new();
    let mut id_names = IdentifierAllocator::new();

    let state_ids: Vec<String> = states.iter().map(|s| id_names.allocate(s.id)).collect();
    let href = |target: usize| format!("#{}", state_ids[remap(target)]);

    let web_states: Vec<WebState> = states
        .iter()
        .zip(&state_ids)
        .map(|(state, id)| WebState {
            attributes: ElementAttributes {
                id: id.clone(),
                class: join_classes(&mut class_names, &state.classes),
            },
            line: state.line.clone(),
            speakers: state.speakers.clone(),
            interaction: match &state.interaction {
                TempInteraction::Dismiss { target } => WebInteraction::Dismiss {
                    href: href(*target),
                },
                TempInteraction::Menu { options } => WebInteraction::Menu {
                    options: options
                        .iter()
                        .map(|(content, target)| WebMenuOption {
                            content: content.clone(),
                            href: href(*target),
                        })
                        .collect(),
                },
            },
        })
        .collect();

    let mut asset_paths = Vec::new();

    let web_backgrounds: Vec<WebBackground> = match shared.background {
        None => Vec::new(),
        Some(class) => {
            let class = class_names.allocate(class);
            backgrounds
                .iter()
                .map(|background| {
                    let path = SourcePath::background(&background.normalized);
                    asset_paths.push(path.clone());
                    WebBackground {
                        normalized: background.normalized.clone(),
                        attributes: ElementAttributes {
                            id: id_names.allocate(background.id),
                            class: class.clone(),
                        },
                        path,
                    }
                })
                .collect()
        }
    };

    let character_class = shared.character.map(|c| class_names.allocate(c));
    let emote_class = shared.emote.map(|c| class_names.allocate(c));
    let web_characters: Vec<WebCharacter> = characters
        .iter()
        .map(|character| {
            let declared = &script.characters[character.slot];
            WebCharacter {
                normalized: declared.normalized.clone(),
                verbatim: declared.verbatim.clone(),
                attributes: ElementAttributes {
                    id: id_names.allocate(character.id),
                    class: character_class.clone().unwrap_or_default(),
                },
                emotes: character
                    .emotes
                    .iter()
                    .map(|emote| {
                        let path = SourcePath::emote(&declared.normalized, &emote.normalized);
                        asset_paths.push(path.clone());
                        WebEmote {
                            normalized: emote.normalized.clone(),
                            attributes: ElementAttributes {
                                id: id_names.allocate(emote.id),
                                class: emote_class.clone().unwrap_or_default(),
                            },
                            path,
                        }
                    })
                    .collect(),
            }
        })
        .collect();

    // -----------------------------------------------------------------------
    // CSS fragment
    // -----------------------------------------------------------------------

    let mut fragment = Fragment::default();
    let state_class = class_names.allocate(state_class);
    let initial_id = &state_ids[count - 1];

    fragment.rule(&format!(".{}", state_class), &["state", "active-state"]);
    if count > 1 {
        fragment.rule(
            &format!(
                ".{class}:not(:target):not(#{initial}), :target ~ #{initial}",
                class = state_class,
                initial = initial_id
            ),
            &["inactive-state"],
        );
    }

    if let Some(class) = shared.background {
        let members: Vec<Member> = backgrounds
            .iter()
            .map(|b| Member {
                id: id_names.allocate(b.id),
                activation: class_names.allocate(b.activation),
                initial: b.initial,
            })
            .collect();
        fragment.activation_rules(&class_names.allocate(class), "background", " ~ ", &members);
    }

    if let Some(class) = shared.character {
        let members: Vec<Member> = characters
            .iter()
            .map(|c| Member {
                id: id_names.allocate(c.id),
                activation: class_names.allocate(c.presence),
                initial: c.initial,
            })
            .collect();
        fragment.activation_rules(&class_names.allocate(class), "character", " ~ ", &members);
    }

    let mut names = Names {
        classes: &mut class_names,
        ids: &mut id_names,
    };
    fragment.animation_rules(&mut names, &characters, &entry_names, "entry", |c| &c.entries);
    fragment.animation_rules(&mut names, &characters, &exit_names, "exit", |c| &c.exits);

    if let Some(class) = shared.emote {
        let members: Vec<Member> = characters
            .iter()
            .flat_map(|c| c.emotes.iter())
            .map(|e| Member {
                id: id_names.allocate(e.id),
                activation: class_names.allocate(e.activation),
                initial: e.initial,
            })
            .collect();
        fragment.activation_rules(&class_names.allocate(class), "emote", " ~ * ", &members);
    }

    tracing::debug!(
        states = count,
        backgrounds = web_backgrounds.len(),
        characters = web_characters.len(),
        unique_ids = uids.issued(),
        classes = class_names.len(),
        ids = id_names.len(),
        "transpiled script"
    );

    Ok(Transpiled {
        data: WebData {
            states: web_states,
            backgrounds: web_backgrounds,
            characters: web_characters,
        },
        css_fragment: fragment.finish(),
        asset_paths,
    })
}

/// Both allocators, borrowed together.
struct Names<'a> {
    classes: &'a mut IdentifierAllocator,
    ids: &'a mut IdentifierAllocator,
}

fn join_classes(allocator: &mut IdentifierAllocator, classes: &[UniqueId]) -> String {
    classes
        .iter()
        .map(|&class| allocator.allocate(class))
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Fragment writer
// ---------------------------------------------------------------------------

/// One element that an activation class switches on.
#[derive(Debug)]
struct Member {
    id: String,
    activation: String,
    /// Shown by the initial state.
    initial: bool,
}

#[derive(Debug, Default)]
struct Fragment {
    lines: Vec<String>,
}

impl Fragment {
    fn rule(&mut self, selector: &str, mixins: &[&str]) {
        self.lines.push(selector.to_string());
        for mixin in mixins {
            self.lines.push(format!("  @include {}", mixin));
        }
    }

    /// Visibility rules for elements of one kind sharing `class`.
    ///
    /// Without initial members everything starts inactive. Otherwise the
    /// initial members start active and are switched off only when a state
    /// lacking their activation class is targeted.
    fn activation_rules(&mut self, class: &str, kind: &str, combinator: &str, members: &[Member]) {
        if members.is_empty() {
            return;
        }

        let active = format!("active-{}", kind);
        let inactive = format!("inactive-{}", kind);
        let targeted = |member: &Member| {
            format!(".{}:target{}#{}", member.activation, combinator, member.id)
        };

        let initial: Vec<&Member> = members.iter().filter(|m| m.initial).collect();

        if initial.is_empty() {
            self.rule(&format!(".{}", class), &[kind, &inactive]);
            let selectors: Vec<String> = members.iter().map(targeted).collect();
            self.rule(&selectors.join(", "), &[&active]);
            return;
        }

        self.rule(&format!(".{}", class), &[kind]);

        // A single `:not` list weighs one id however many members it names, so
        // the targeted rules below still outrank it.
        let mut inactive_selectors = vec![format!(
            ".{}:not({})",
            class,
            initial
                .iter()
                .map(|m| format!("#{}", m.id))
                .collect::<Vec<_>>()
                .join(", ")
        )];
        inactive_selectors.extend(initial.iter().map(|m| {
            format!(":target:not(.{}){}#{}", m.activation, combinator, m.id)
        }));
        self.rule(&inactive_selectors.join(", "), &[&inactive]);

        let mut active_selectors: Vec<String> =
            initial.iter().map(|m| format!("#{}", m.id)).collect();
        active_selectors.extend(members.iter().filter(|m| !m.initial).map(targeted));
        self.rule(&active_selectors.join(", "), &[&active]);
    }

    /// One rule per animation name, firing on every character that uses it
    /// while a state triggering it is targeted. Animations of the initial
    /// state also fire when nothing is targeted.
    fn animation_rules(
        &mut self,
        names: &mut Names<'_>,
        characters: &Registry<TempCharacter>,
        animations: &[String],
        direction: &str,
        pick: fn(&TempCharacter) -> &Registry<TempAnimation>,
    ) {
        for animation in animations {
            let mut selectors = Vec::new();
            for character in characters.iter() {
                let Some(entity) = pick(character).iter().find(|a| &a.normalized == animation)
                else {
                    continue;
                };
                let id = names.ids.allocate(character.id);
                selectors.push(format!(
                    ".{}:target ~ #{}",
                    names.classes.allocate(entity.activation),
                    id
                ));
                if entity.initial {
                    selectors.push(format!("#{}:not(:target ~ *)", id));
                }
            }
            self.rule(
                &selectors.join(", "),
                &[&format!("{}-{}-animation", animation, direction)],
            );
        }
    }

    fn finish(self) -> String {
        self.lines.join("\n")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
