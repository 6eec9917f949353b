use rand::seq::SliceRandom;
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::audio::PlayerError;
use crate::sources::Track;

/// Cola de reproducción de un guild
///
/// FIFO con capacidad máxima. Pertenece a exactamente un `Player`, que la
/// guarda dentro de su lock de estado; por eso este tipo es síncrono y no
/// sabe nada de Discord ni de concurrencia.
#[derive(Debug)]
pub struct TrackQueue {
    items: VecDeque<Track>,
    max_size: usize,
}

impl TrackQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Agrega un track al final de la cola
    ///
    /// Devuelve la cantidad de tracks en cola después de agregar, o error
    /// si la cola ya está en su capacidad máxima (sin modificar nada).
    pub fn push(&mut self, track: Track) -> Result<usize, PlayerError> {
        if self.items.len() >= self.max_size {
            return Err(PlayerError::QueueFull(self.max_size));
        }

        debug!("➕ Agregado a la cola: {}", track.title());
        self.items.push_back(track);
        Ok(self.items.len())
    }

    /// Reencola un track al final, sin chequear capacidad
    ///
    /// Solo para la repetición de cola: el track venía de esta misma cola,
    /// así que devolverlo no cuenta contra el límite de encolado.
    pub fn requeue(&mut self, track: Track) {
        debug!("🔁 Reencolado por repetición de cola: {}", track.title());
        self.items.push_back(track);
    }

    /// Saca el primer track de la cola (FIFO estricto)
    pub fn pop(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    /// Limpia la cola
    pub fn clear(&mut self) {
        self.items.clear();
        info!("🗑️ Cola limpiada");
    }

    /// Mezcla la cola con orden uniforme
    ///
    /// Con menos de 2 tracks no hay nada que mezclar y devuelve error para
    /// que el comando pueda avisarle al usuario.
    pub fn shuffle(&mut self) -> Result<(), PlayerError> {
        if self.items.len() < 2 {
            return Err(PlayerError::NotEnoughTracks);
        }

        let mut items: Vec<_> = self.items.drain(..).collect();
        items.shuffle(&mut rand::thread_rng());
        self.items.extend(items);
        info!("🔀 Cola mezclada ({} canciones)", self.items.len());
        Ok(())
    }

    /// Elimina el track en la posición dada (1-based, como la ve el usuario)
    ///
    /// Devuelve el track eliminado; el resto conserva su orden relativo.
    pub fn remove_at(&mut self, position: usize) -> Result<Track, PlayerError> {
        if position == 0 || position > self.items.len() {
            return Err(PlayerError::InvalidPosition {
                position,
                len: self.items.len(),
            });
        }

        // remove nunca falla acá: la posición ya fue validada
        let removed = self
            .items
            .remove(position - 1)
            .ok_or(PlayerError::InvalidPosition {
                position,
                len: self.items.len(),
            })?;
        debug!("❌ Eliminado de la posición {}: {}", position, removed.title());
        Ok(removed)
    }

    /// Cantidad de tracks en espera
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Verifica si la cola está vacía
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Copia de los primeros `limit` tracks, sin consumirlos
    pub fn preview(&self, limit: usize) -> Vec<Track> {
        self.items.iter().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    fn track(title: &str) -> Track {
        Track::new(
            title.to_string(),
            format!("https://youtube.com/watch?v={title}"),
            UserId::new(1),
        )
    }

    fn full_queue(n: usize) -> TrackQueue {
        let mut queue = TrackQueue::new(n);
        for i in 0..n {
            queue.push(track(&format!("cancion-{i}"))).unwrap();
        }
        queue
    }

    #[test]
    fn test_push_reports_new_length() {
        let mut queue = TrackQueue::new(10);
        assert_eq!(queue.push(track("a")).unwrap(), 1);
        assert_eq!(queue.push(track("b")).unwrap(), 2);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_push_rejects_when_full() {
        let mut queue = full_queue(3);

        let err = queue.push(track("extra")).unwrap_err();
        assert!(matches!(err, PlayerError::QueueFull(3)));
        // La cola quedó exactamente como estaba
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().unwrap().title(), "cancion-0");
    }

    #[test]
    fn test_pop_is_fifo() {
        let mut queue = TrackQueue::new(10);
        queue.push(track("primero")).unwrap();
        queue.push(track("segundo")).unwrap();
        queue.push(track("tercero")).unwrap();

        assert_eq!(queue.pop().unwrap().title(), "primero");
        assert_eq!(queue.pop().unwrap().title(), "segundo");
        assert_eq!(queue.pop().unwrap().title(), "tercero");
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_requeue_ignores_capacity() {
        let mut queue = full_queue(2);
        let current = queue.pop().unwrap();
        queue.push(track("nuevo")).unwrap();

        // push normal rechazaría, requeue no
        queue.requeue(current);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_remove_at_is_one_based() {
        let mut queue = TrackQueue::new(10);
        queue.push(track("a")).unwrap();
        queue.push(track("b")).unwrap();
        queue.push(track("c")).unwrap();

        let removed = queue.remove_at(2).unwrap();
        assert_eq!(removed.title(), "b");
        assert_eq!(queue.pop().unwrap().title(), "a");
        assert_eq!(queue.pop().unwrap().title(), "c");
    }

    #[test]
    fn test_remove_at_rejects_out_of_bounds() {
        let mut queue = TrackQueue::new(10);
        queue.push(track("a")).unwrap();

        assert!(matches!(
            queue.remove_at(0),
            Err(PlayerError::InvalidPosition { position: 0, len: 1 })
        ));
        assert!(matches!(
            queue.remove_at(2),
            Err(PlayerError::InvalidPosition { position: 2, len: 1 })
        ));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_shuffle_needs_two_tracks() {
        let mut queue = TrackQueue::new(10);
        assert!(matches!(queue.shuffle(), Err(PlayerError::NotEnoughTracks)));

        queue.push(track("solo")).unwrap();
        assert!(matches!(queue.shuffle(), Err(PlayerError::NotEnoughTracks)));
        assert_eq!(queue.pop().unwrap().title(), "solo");
    }

    #[test]
    fn test_shuffle_keeps_same_tracks() {
        let mut queue = full_queue(20);
        queue.shuffle().unwrap();

        assert_eq!(queue.len(), 20);
        let mut titles: Vec<String> = queue
            .preview(20)
            .iter()
            .map(|t| t.title().to_string())
            .collect();
        titles.sort();
        let mut expected: Vec<String> = (0..20).map(|i| format!("cancion-{i}")).collect();
        expected.sort();
        assert_eq!(titles, expected);
    }

    #[test]
    fn test_preview_respects_limit_without_consuming() {
        let queue = full_queue(5);
        let preview = queue.preview(3);

        assert_eq!(preview.len(), 3);
        assert_eq!(preview[0].title(), "cancion-0");
        assert_eq!(queue.len(), 5);
    }

    #[test]
    fn test_clear_empties_queue() {
        let mut queue = full_queue(4);
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }
}
