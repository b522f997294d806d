//! Channel integrations. WhatsApp is the only transport the bridge speaks;
//! it is wired to the core pipeline in [`whatsapp`].

pub mod whatsapp;
