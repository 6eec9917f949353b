use serenity::all::ButtonStyle;
use serenity::builder::{CreateActionRow, CreateButton};

use crate::audio::player::LoopMode;

/// IDs de los botones de control
pub mod button_ids {
    pub const PLAY_PAUSE: &str = "music_play_pause";
    pub const SKIP: &str = "music_skip";
    pub const STOP: &str = "music_stop";
    pub const LOOP: &str = "music_loop";
    pub const QUEUE: &str = "music_queue";
    pub const VOLUME_UP: &str = "music_volume_up";
    pub const VOLUME_DOWN: &str = "music_volume_down";
}

/// Controles que acompañan al embed de "Reproduciendo Ahora"
///
/// El botón de repetición muestra el modo vigente y al apretarlo pasa al
/// siguiente: apagada, canción, cola.
pub fn create_player_controls(paused: bool, loop_mode: LoopMode) -> Vec<CreateActionRow> {
    let play_pause = if paused {
        CreateButton::new(button_ids::PLAY_PAUSE)
            .emoji('▶')
            .label("Reanudar")
            .style(ButtonStyle::Success)
    } else {
        CreateButton::new(button_ids::PLAY_PAUSE)
            .emoji('⏸')
            .label("Pausa")
            .style(ButtonStyle::Secondary)
    };

    let skip = CreateButton::new(button_ids::SKIP)
        .emoji('⏭')
        .label("Saltar")
        .style(ButtonStyle::Primary);

    let stop = CreateButton::new(button_ids::STOP)
        .emoji('⏹')
        .label("Detener")
        .style(ButtonStyle::Danger);

    let (loop_emoji, loop_label, loop_style) = match loop_mode {
        LoopMode::Off => ('🔁', "Repetir: No", ButtonStyle::Secondary),
        LoopMode::Track => ('🔂', "Repetir: Canción", ButtonStyle::Success),
        LoopMode::Queue => ('🔁', "Repetir: Cola", ButtonStyle::Primary),
    };
    let loop_button = CreateButton::new(button_ids::LOOP)
        .emoji(loop_emoji)
        .label(loop_label)
        .style(loop_style);

    let row1 = CreateActionRow::Buttons(vec![play_pause, skip, stop, loop_button]);

    let queue = CreateButton::new(button_ids::QUEUE)
        .emoji('📜')
        .label("Cola")
        .style(ButtonStyle::Secondary);

    let volume_down = CreateButton::new(button_ids::VOLUME_DOWN)
        .emoji('🔉')
        .label("-10%")
        .style(ButtonStyle::Secondary);

    let volume_up = CreateButton::new(button_ids::VOLUME_UP)
        .emoji('🔊')
        .label("+10%")
        .style(ButtonStyle::Secondary);

    let row2 = CreateActionRow::Buttons(vec![queue, volume_down, volume_up]);

    vec![row1, row2]
}
