//! Bot API wire types.

mod send;
mod update;

pub use send::{
    AnswerCallbackParams, GetUpdatesParams, InlineKeyboardButton, InlineKeyboardMarkup,
    SendMessageParams,
};
pub use update::{ApiResponse, CallbackQuery, Chat, Message, PhotoSize, Update, User};
