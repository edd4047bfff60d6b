use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash, Ord, PartialOrd)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

id_newtype!(ProgramId);
id_newtype!(AcademicYearId);
id_newtype!(SectionId);
id_newtype!(SubjectId);
id_newtype!(TeacherId);
id_newtype!(RoomId);
id_newtype!(SlotId);
id_newtype!(ElectiveBlockId);
id_newtype!(CombinedGroupId);
id_newtype!(FixedEntryId);
id_newtype!(SpecialAllotmentId);
id_newtype!(RunId);
id_newtype!(EntryId);
id_newtype!(ConflictId);
