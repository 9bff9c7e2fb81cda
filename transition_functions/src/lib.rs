// TODO: Carry the committees of the current epoch over to the next transition.
//       `epoch_intermediates::participation` reshuffles the registry for the previous epoch even
//       though the same shuffle was computed one epoch earlier.

pub use epoch_processing::{transition_epoch, transition_epoch_with_verifier};
pub use slot_processing::{advance_slot, advance_slot_with_verifier, process_slot};

pub mod epoch_intermediates;
pub mod epoch_processing;

mod slot_processing;
