//! Win32 backend: low-level keyboard hooks, key-state probe, session
//! notifications
//!
//! Each slot's WH_KEYBOARD_LL hook lives on its own message-pump thread;
//! a thread-local slot pointer lets a single hook procedure serve every
//! registration instead of one trampoline per slot. Hook callbacks run
//! inside the OS's time-boxed delivery context, so everything on that
//! path defers to the lock-free slot fast path.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use tracing::{debug, error};

use windows::core::w;
use windows::Win32::Foundation::{HMODULE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::RemoteDesktop::{
    WTSRegisterSessionNotification, WTSUnRegisterSessionNotification, NOTIFY_FOR_THIS_SESSION,
};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, CreateWindowExW, DefWindowProcW, DispatchMessageW, GetMessageW,
    GetWindowLongPtrW, PostQuitMessage, PostThreadMessageW, RegisterClassExW, SetWindowLongPtrW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, GWLP_USERDATA, HHOOK, HWND_MESSAGE,
    KBDLLHOOKSTRUCT, MSG, WH_KEYBOARD_LL, WINDOW_EX_STYLE, WINDOW_STYLE, WM_DESTROY, WM_KEYDOWN,
    WM_KEYUP, WM_QUIT, WM_SYSKEYDOWN, WM_SYSKEYUP, WNDCLASSEXW,
};

use crate::hook::{Dispatch, HookError, HookPool, HookSlot, KeyDirection};

use super::HookBackend;

// Declared in the RemoteDesktop headers but not exposed as a constant.
const WM_WTSSESSION_CHANGE: u32 = 0x02B1;

thread_local! {
    /// Slot served by the hook installed on this pump thread.
    static ACTIVE_SLOT: RefCell<Option<Arc<HookSlot>>> = const { RefCell::new(None) };
}

unsafe extern "system" fn keyboard_hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        let info = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
        let direction = match wparam.0 as u32 {
            WM_KEYDOWN | WM_SYSKEYDOWN => Some(KeyDirection::Down),
            WM_KEYUP | WM_SYSKEYUP => Some(KeyDirection::Up),
            _ => None,
        };
        if let Some(direction) = direction {
            let outcome = ACTIVE_SLOT.with(|slot| {
                slot.borrow()
                    .as_ref()
                    .map(|slot| slot.on_key_event(direction, info.vkCode as u8))
            });
            if outcome == Some(Dispatch::Consumed) {
                return LRESULT(1);
            }
        }
    }
    CallNextHookEx(HHOOK(0), code, wparam, lparam)
}

struct Pump {
    thread_id: u32,
    join: thread::JoinHandle<()>,
}

/// One message-pump thread per installed slot.
#[derive(Default)]
pub struct Win32Backend {
    pumps: Mutex<HashMap<usize, Pump>>,
}

impl HookBackend for Win32Backend {
    fn install(&self, slot: Arc<HookSlot>) -> Result<(), HookError> {
        let index = slot.index();
        let (ready_tx, ready_rx) = mpsc::channel();

        let join = thread::Builder::new()
            .name(format!("kbd-hook-{index}"))
            .spawn(move || hook_pump(slot, ready_tx))
            .map_err(|e| HookError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                self.pumps_state().insert(index, Pump { thread_id, join });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = join.join();
                Err(e)
            }
            Err(_) => {
                let _ = join.join();
                Err(HookError::Install(
                    "hook thread exited before reporting".to_string(),
                ))
            }
        }
    }

    fn uninstall(&self, slot_index: usize) {
        if let Some(pump) = self.pumps_state().remove(&slot_index) {
            unsafe {
                let _ = PostThreadMessageW(pump.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
            }
            let _ = pump.join.join();
        }
    }
}

impl Win32Backend {
    fn pumps_state(&self) -> std::sync::MutexGuard<'_, HashMap<usize, Pump>> {
        match self.pumps.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn hook_pump(slot: Arc<HookSlot>, ready_tx: mpsc::Sender<Result<u32, HookError>>) {
    unsafe {
        let module = GetModuleHandleW(None).unwrap_or(HMODULE::default());
        let hook = match SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), module, 0) {
            Ok(hook) => hook,
            Err(e) => {
                let _ = ready_tx.send(Err(HookError::Install(e.to_string())));
                return;
            }
        };

        let index = slot.index();
        ACTIVE_SLOT.with(|active| *active.borrow_mut() = Some(slot));
        let _ = ready_tx.send(Ok(GetCurrentThreadId()));
        debug!(slot = index, "hook pump running");

        let mut msg = MSG::default();
        while GetMessageW(&mut msg, HWND(0), 0, 0).into() {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        ACTIVE_SLOT.with(|active| active.borrow_mut().take());
        if let Err(e) = UnhookWindowsHookEx(hook) {
            error!(slot = index, ?e, "failed to remove keyboard hook");
        }
    }
}

/// High bit of GetAsyncKeyState: the key is physically down right now.
pub fn any_key_down() -> bool {
    (1..=255i32).any(|vk| unsafe { GetAsyncKeyState(vk) } as u16 & 0x8000 != 0)
}

unsafe extern "system" fn session_wndproc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_WTSSESSION_CHANGE => {
            let pool = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const HookPool;
            if !pool.is_null() {
                debug!(event = wparam.0, "session change; clearing key state");
                (*pool).reset_all();
            }
            LRESULT(0)
        }
        WM_DESTROY => {
            PostQuitMessage(0);
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

/// Joinable session-notification listener.
pub struct SessionPump {
    thread_id: u32,
    join: Option<thread::JoinHandle<()>>,
}

impl SessionPump {
    pub fn stop(mut self) {
        unsafe {
            let _ = PostThreadMessageW(self.thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

pub fn spawn_session_pump(pool: Arc<HookPool>) -> Result<SessionPump, HookError> {
    let (ready_tx, ready_rx) = mpsc::channel();

    let join = thread::Builder::new()
        .name("session-watch".to_string())
        .spawn(move || session_pump(pool, ready_tx))
        .map_err(|e| HookError::ThreadSpawn(e.to_string()))?;

    match ready_rx.recv() {
        Ok(Ok(thread_id)) => Ok(SessionPump {
            thread_id,
            join: Some(join),
        }),
        Ok(Err(e)) => {
            let _ = join.join();
            Err(e)
        }
        Err(_) => {
            let _ = join.join();
            Err(HookError::Install(
                "session listener exited before reporting".to_string(),
            ))
        }
    }
}

fn session_pump(pool: Arc<HookPool>, ready_tx: mpsc::Sender<Result<u32, HookError>>) {
    unsafe {
        let module = GetModuleHandleW(None).unwrap_or(HMODULE::default());
        let class_name = w!("bindkeysd-session");

        let class = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            lpfnWndProc: Some(session_wndproc),
            hInstance: module.into(),
            lpszClassName: class_name,
            ..Default::default()
        };
        if RegisterClassExW(&class) == 0 {
            let _ = ready_tx.send(Err(HookError::Install(
                "failed to register listener window class".to_string(),
            )));
            return;
        }

        // Message-only window: it never draws, it only receives session
        // notifications.
        let hwnd = CreateWindowExW(
            WINDOW_EX_STYLE(0),
            class_name,
            w!("bindkeysd session watcher"),
            WINDOW_STYLE(0),
            0,
            0,
            0,
            0,
            HWND_MESSAGE,
            None,
            module,
            None,
        );
        if hwnd.0 == 0 {
            let _ = ready_tx.send(Err(HookError::Install(
                "failed to create listener window".to_string(),
            )));
            return;
        }

        let pool_ptr = Arc::into_raw(pool);
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, pool_ptr as isize);

        if WTSRegisterSessionNotification(hwnd, NOTIFY_FOR_THIS_SESSION).is_err() {
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
            drop(Arc::from_raw(pool_ptr));
            let _ = ready_tx.send(Err(HookError::Install(
                "failed to subscribe to session notifications".to_string(),
            )));
            return;
        }

        let _ = ready_tx.send(Ok(GetCurrentThreadId()));
        debug!("session listener running");

        let mut msg = MSG::default();
        while GetMessageW(&mut msg, HWND(0), 0, 0).into() {
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        let _ = WTSUnRegisterSessionNotification(hwnd);
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
        drop(Arc::from_raw(pool_ptr));
    }
}
