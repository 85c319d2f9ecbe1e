/// Generate `as_str`, `Display`, `From<T> for String`, and `TryFrom<String> for T`
/// for a closed enum (unknown strings return an error).
///
/// The enum must already have its definition with derives. This macro only adds
/// the conversion impls. Add `#[serde(into = "String", try_from = "String")]` to
/// the enum to get automatic Serialize/Deserialize via these impls.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $str,)+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$name> for String {
            fn from(v: $name) -> Self {
                v.as_str().to_string()
            }
        }

        impl TryFrom<String> for $name {
            type Error = String;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                match s.as_str() {
                    $($str => Ok($name::$variant),)+
                    other => Err(format!("unknown {}: {other}", stringify!($name))),
                }
            }
        }
    };
}

/// Declare the closed set of component stores.
///
/// For every `field: Type => Key` entry this generates a `ComponentStore<Type>`
/// field on [`Components`](crate::model::Components), a `StoreKey::Key` variant
/// named after the field, an `impl Component for Type`, and a matching field on
/// [`StoreSnapshot`](crate::model::StoreSnapshot) holding `(id, data)` pairs.
macro_rules! component_stores {
    ($($field:ident : $ty:ident => $key:ident),+ $(,)?) => {
        /// Compile-time identifier of a component store.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum StoreKey {
            $($key,)+
        }

        impl StoreKey {
            pub const ALL: &'static [StoreKey] = &[$(StoreKey::$key,)+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(StoreKey::$key => stringify!($field),)+
                }
            }
        }

        /// Every component table in the world, one typed store per component.
        #[derive(Debug, Clone, Default)]
        pub struct Components {
            $(pub $field: ComponentStore<$ty>,)+
        }

        impl Components {
            /// Remove every component attached to `id`. Returns how many were removed.
            pub fn remove_entity(&mut self, id: EntityId) -> usize {
                let mut removed = 0;
                $(if self.$field.remove(id).is_some() { removed += 1; })+
                removed
            }

            /// Every id that has at least one component attached.
            pub fn entity_ids(&self) -> ::std::collections::BTreeSet<EntityId> {
                let mut ids = ::std::collections::BTreeSet::new();
                $(ids.extend(self.$field.ids());)+
                ids
            }

            pub fn to_snapshot(&self) -> StoreSnapshot {
                StoreSnapshot {
                    $($field: self.$field.to_pairs(),)+
                }
            }

            pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
                Self {
                    $($field: ComponentStore::from_pairs(snapshot.$field),)+
                }
            }
        }

        /// Serialized component tables: store name → `[id, data]` pairs.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        #[serde(deny_unknown_fields)]
        pub struct StoreSnapshot {
            $(
                #[serde(default)]
                pub $field: Vec<(EntityId, $ty)>,
            )+
        }

        impl StoreSnapshot {
            /// Every id referenced by any store, with the store it appeared in.
            pub fn referenced_ids(&self) -> Vec<(StoreKey, EntityId)> {
                let mut out = Vec::new();
                $(out.extend(self.$field.iter().map(|(id, _)| (StoreKey::$key, *id)));)+
                out
            }
        }

        $(
            impl Component for $ty {
                const STORE: StoreKey = StoreKey::$key;

                fn store(components: &Components) -> &ComponentStore<Self> {
                    &components.$field
                }

                fn store_mut(components: &mut Components) -> &mut ComponentStore<Self> {
                    &mut components.$field
                }
            }
        )+
    };
}
