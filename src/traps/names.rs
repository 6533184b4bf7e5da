// A-Trap opcodes and their names. OS traps live in 0xA000-0xA7FF with flag
// bits 9/10; Toolbox traps set bit 11. The name table drives trap logging
// and the unimplemented-trap error message.

#![allow(dead_code)]

// ---- OS traps (arguments in registers) --------------------------------

pub const OPEN: u16 = 0xA000;
pub const CLOSE: u16 = 0xA001;
pub const READ: u16 = 0xA002;
pub const WRITE: u16 = 0xA003;
pub const GET_VOL_INFO: u16 = 0xA007;
pub const CREATE: u16 = 0xA008;
pub const DELETE: u16 = 0xA009;
pub const OPEN_RF: u16 = 0xA00A;
pub const GET_FILE_INFO: u16 = 0xA00C;
pub const SET_FILE_INFO: u16 = 0xA00D;
pub const ALLOCATE: u16 = 0xA010;
pub const GET_EOF: u16 = 0xA011;
pub const SET_EOF: u16 = 0xA012;
pub const FLUSH_VOL: u16 = 0xA013;
pub const SET_VOL: u16 = 0xA015;
pub const FREE_MEM: u16 = 0xA01C;
pub const DISPOSE_PTR: u16 = 0xA01F;
pub const SET_GROW_ZONE: u16 = 0xA04B;
pub const DISPOSE_HANDLE: u16 = 0xA023;
pub const SET_HANDLE_SIZE: u16 = 0xA024;
pub const GET_HANDLE_SIZE: u16 = 0xA025;
pub const REALLOC_HANDLE: u16 = 0xA027;
pub const RECOVER_HANDLE: u16 = 0xA128;
pub const H_LOCK: u16 = 0xA029;
pub const H_UNLOCK: u16 = 0xA02A;
pub const EMPTY_HANDLE: u16 = 0xA02B;
pub const SET_APPL_LIMIT: u16 = 0xA02D;
pub const BLOCK_MOVE: u16 = 0xA02E;
pub const BLOCK_MOVE_DATA: u16 = 0xA22E;
pub const POST_EVENT: u16 = 0xA02F;
pub const OS_EVENT_AVAIL: u16 = 0xA030;
pub const GET_OS_EVENT: u16 = 0xA031;
pub const FLUSH_EVENTS: u16 = 0xA032;
pub const MORE_MASTERS: u16 = 0xA036;
pub const READ_DATE_TIME: u16 = 0xA039;
pub const DELAY: u16 = 0xA03B;
pub const SET_TRAP_ADDRESS: u16 = 0xA047;
pub const H_PURGE: u16 = 0xA049;
pub const H_NO_PURGE: u16 = 0xA04A;
pub const MAX_APPL_ZONE: u16 = 0xA063;
pub const SYS_ENVIRONS: u16 = 0xA090;
pub const NEW_PTR: u16 = 0xA11E;
pub const NEW_PTR_SYS: u16 = 0xA51E;
pub const NEW_PTR_CLEAR: u16 = 0xA31E;
pub const NEW_PTR_SYS_CLEAR: u16 = 0xA71E;
pub const NEW_HANDLE: u16 = 0xA122;
pub const NEW_HANDLE_CLEAR: u16 = 0xA322;
pub const GET_TRAP_ADDRESS: u16 = 0xA146;
pub const GET_OS_TRAP_ADDRESS: u16 = 0xA346;
pub const GET_TOOLBOX_TRAP_ADDRESS: u16 = 0xA746;
pub const SET_TOOLBOX_TRAP_ADDRESS: u16 = 0xA647;

// ---- Toolbox traps (arguments on the stack) ---------------------------

pub const INIT_CURSOR: u16 = 0xA850;
pub const SET_CURSOR: u16 = 0xA851;
pub const HIDE_CURSOR: u16 = 0xA852;
pub const SHOW_CURSOR: u16 = 0xA853;
pub const BIT_AND: u16 = 0xA858;
pub const BIT_XOR: u16 = 0xA859;
pub const BIT_NOT: u16 = 0xA85A;
pub const BIT_OR: u16 = 0xA85B;
pub const BIT_SHIFT: u16 = 0xA85C;
pub const BIT_TST: u16 = 0xA85D;
pub const BIT_SET: u16 = 0xA85E;
pub const BIT_CLR: u16 = 0xA85F;
pub const WAIT_NEXT_EVENT: u16 = 0xA860;
pub const RANDOM: u16 = 0xA861;
pub const STUFF_HEX: u16 = 0xA866;
pub const FIX_MUL: u16 = 0xA868;
pub const FIX_RATIO: u16 = 0xA869;
pub const HI_WORD: u16 = 0xA86A;
pub const LO_WORD: u16 = 0xA86B;
pub const FIX_ROUND: u16 = 0xA86C;
pub const INIT_GRAF: u16 = 0xA86E;
pub const OPEN_PORT: u16 = 0xA86F;
pub const LOCAL_TO_GLOBAL: u16 = 0xA870;
pub const GLOBAL_TO_LOCAL: u16 = 0xA871;
pub const GET_MOUSE: u16 = 0xA972;
pub const SET_PORT: u16 = 0xA873;
pub const GET_PORT: u16 = 0xA874;
pub const SET_PORT_BITS: u16 = 0xA875;
pub const SET_ORIGIN: u16 = 0xA878;
pub const SET_CLIP: u16 = 0xA879;
pub const GET_CLIP: u16 = 0xA87A;
pub const CLIP_RECT: u16 = 0xA87B;
pub const ADD_PT: u16 = 0xA87E;
pub const SUB_PT: u16 = 0xA87F;
pub const SET_PT: u16 = 0xA880;
pub const EQUAL_PT: u16 = 0xA881;
pub const DRAW_CHAR: u16 = 0xA883;
pub const DRAW_STRING: u16 = 0xA884;
pub const DRAW_TEXT: u16 = 0xA885;
pub const TEXT_WIDTH: u16 = 0xA886;
pub const TEXT_FONT: u16 = 0xA887;
pub const TEXT_FACE: u16 = 0xA888;
pub const TEXT_MODE: u16 = 0xA889;
pub const TEXT_SIZE: u16 = 0xA88A;
pub const GET_FONT_INFO: u16 = 0xA88B;
pub const STRING_WIDTH: u16 = 0xA88C;
pub const CHAR_WIDTH: u16 = 0xA88D;
pub const LINE_TO: u16 = 0xA891;
pub const LINE: u16 = 0xA892;
pub const MOVE_TO: u16 = 0xA893;
pub const MOVE: u16 = 0xA894;
pub const HIDE_PEN: u16 = 0xA896;
pub const SHOW_PEN: u16 = 0xA897;
pub const GET_PEN: u16 = 0xA89A;
pub const PEN_SIZE: u16 = 0xA89B;
pub const PEN_MODE: u16 = 0xA89C;
pub const PEN_PAT: u16 = 0xA89D;
pub const PEN_NORMAL: u16 = 0xA89E;
pub const UNIMPLEMENTED: u16 = 0xA89F;
pub const FRAME_RECT: u16 = 0xA8A1;
pub const PAINT_RECT: u16 = 0xA8A2;
pub const ERASE_RECT: u16 = 0xA8A3;
pub const INVERT_RECT: u16 = 0xA8A4;
pub const FILL_RECT: u16 = 0xA8A5;
pub const EQUAL_RECT: u16 = 0xA8A6;
pub const SET_RECT: u16 = 0xA8A7;
pub const OFFSET_RECT: u16 = 0xA8A8;
pub const INSET_RECT: u16 = 0xA8A9;
pub const SECT_RECT: u16 = 0xA8AA;
pub const UNION_RECT: u16 = 0xA8AB;
pub const PT2RECT: u16 = 0xA8AC;
pub const PT_IN_RECT: u16 = 0xA8AD;
pub const EMPTY_RECT: u16 = 0xA8AE;
pub const FRAME_ROUND_RECT: u16 = 0xA8B0;
pub const PAINT_ROUND_RECT: u16 = 0xA8B1;
pub const ERASE_ROUND_RECT: u16 = 0xA8B2;
pub const INVERT_ROUND_RECT: u16 = 0xA8B3;
pub const FILL_ROUND_RECT: u16 = 0xA8B4;
pub const FRAME_OVAL: u16 = 0xA8B7;
pub const PAINT_OVAL: u16 = 0xA8B8;
pub const ERASE_OVAL: u16 = 0xA8B9;
pub const INVERT_OVAL: u16 = 0xA8BA;
pub const FILL_OVAL: u16 = 0xA8BB;
pub const FRAME_RGN: u16 = 0xA8D2;
pub const PAINT_RGN: u16 = 0xA8D3;
pub const ERASE_RGN: u16 = 0xA8D4;
pub const INVERT_RGN: u16 = 0xA8D5;
pub const FILL_RGN: u16 = 0xA8D6;
pub const NEW_RGN: u16 = 0xA8D8;
pub const DISPOSE_RGN: u16 = 0xA8D9;
pub const OPEN_RGN: u16 = 0xA8DA;
pub const CLOSE_RGN: u16 = 0xA8DB;
pub const COPY_RGN: u16 = 0xA8DC;
pub const SET_EMPTY_RGN: u16 = 0xA8DD;
pub const SET_REC_RGN: u16 = 0xA8DE;
pub const RECT_RGN: u16 = 0xA8DF;
pub const OFFSET_RGN: u16 = 0xA8E0;
pub const PT_IN_RGN: u16 = 0xA8E8;
pub const RECT_IN_RGN: u16 = 0xA8E9;
pub const DRAW_PICTURE: u16 = 0xA8F6;
pub const INIT_FONTS: u16 = 0xA8FE;
pub const GET_F_NAME: u16 = 0xA8FF;
pub const GET_F_NUM: u16 = 0xA900;
pub const REAL_FONT: u16 = 0xA902;
pub const DRAG_GRAY_RGN: u16 = 0xA905;
pub const GET_WMGR_PORT: u16 = 0xA910;
pub const INIT_WINDOWS: u16 = 0xA912;
pub const NEW_WINDOW: u16 = 0xA913;
pub const DISPOSE_WINDOW: u16 = 0xA914;
pub const SHOW_WINDOW: u16 = 0xA915;
pub const HIDE_WINDOW: u16 = 0xA916;
pub const GET_WREF_CON: u16 = 0xA917;
pub const SET_WREF_CON: u16 = 0xA918;
pub const GET_WTITLE: u16 = 0xA919;
pub const SET_WTITLE: u16 = 0xA91A;
pub const MOVE_WINDOW: u16 = 0xA91B;
pub const SELECT_WINDOW: u16 = 0xA91F;
pub const BEGIN_UPDATE: u16 = 0xA922;
pub const END_UPDATE: u16 = 0xA923;
pub const FRONT_WINDOW: u16 = 0xA924;
pub const DRAG_WINDOW: u16 = 0xA925;
pub const INVAL_RECT: u16 = 0xA928;
pub const VALID_RECT: u16 = 0xA92A;
pub const FIND_WINDOW: u16 = 0xA92C;
pub const INIT_MENUS: u16 = 0xA930;
pub const NEW_MENU: u16 = 0xA931;
pub const APPEND_MENU: u16 = 0xA933;
pub const CLEAR_MENU_BAR: u16 = 0xA934;
pub const INSERT_MENU: u16 = 0xA935;
pub const DELETE_MENU: u16 = 0xA936;
pub const DRAW_MENU_BAR: u16 = 0xA937;
pub const HILITE_MENU: u16 = 0xA938;
pub const ENABLE_ITEM: u16 = 0xA939;
pub const DISABLE_ITEM: u16 = 0xA93A;
pub const GET_MENU_BAR: u16 = 0xA93B;
pub const SET_MENU_BAR: u16 = 0xA93C;
pub const MENU_SELECT: u16 = 0xA93D;
pub const MENU_KEY: u16 = 0xA93E;
pub const GET_MENU_ITEM_TEXT: u16 = 0xA946;
pub const CHECK_ITEM: u16 = 0xA945;
pub const GET_MENU_HANDLE: u16 = 0xA949;
pub const PLOT_ICON: u16 = 0xA94B;
pub const APPEND_RES_MENU: u16 = 0xA94D;
pub const COUNT_M_ITEMS: u16 = 0xA950;
pub const GET_NEW_CONTROL: u16 = 0xA9BE;
pub const BUTTON: u16 = 0xA974;
pub const STILL_DOWN: u16 = 0xA973;
pub const TICK_COUNT: u16 = 0xA975;
pub const GET_KEYS: u16 = 0xA976;
pub const GET_NEXT_EVENT: u16 = 0xA970;
pub const EVENT_AVAIL: u16 = 0xA971;
pub const INIT_DIALOGS: u16 = 0xA97B;
pub const GET_NEW_DIALOG: u16 = 0xA97C;
pub const NEW_DIALOG: u16 = 0xA97D;
pub const IS_DIALOG_EVENT: u16 = 0xA97F;
pub const DIALOG_SELECT: u16 = 0xA980;
pub const DISPOSE_DIALOG: u16 = 0xA983;
pub const ALERT: u16 = 0xA985;
pub const STOP_ALERT: u16 = 0xA986;
pub const NOTE_ALERT: u16 = 0xA987;
pub const CAUTION_ALERT: u16 = 0xA988;
pub const PARAM_TEXT: u16 = 0xA98B;
pub const GET_DIALOG_ITEM: u16 = 0xA98D;
pub const SET_DIALOG_ITEM: u16 = 0xA98E;
pub const MODAL_DIALOG: u16 = 0xA991;
pub const GET_RESOURCE: u16 = 0xA9A0;
pub const GET_NAMED_RESOURCE: u16 = 0xA9A1;
pub const GET1_NAMED_RESOURCE: u16 = 0xA820;
pub const LOAD_RESOURCE: u16 = 0xA9A2;
pub const RELEASE_RESOURCE: u16 = 0xA9A3;
pub const SIZE_RSRC: u16 = 0xA9A5;
pub const GET_RES_ATTRS: u16 = 0xA9A6;
pub const CHANGED_RESOURCE: u16 = 0xA9AA;
pub const WRITE_RESOURCE: u16 = 0xA9B0;
pub const SYSTEM_TASK: u16 = 0xA9B4;
pub const GET_CURSOR: u16 = 0xA9B9;
pub const GET_STRING: u16 = 0xA9BA;
pub const GET_ICON: u16 = 0xA9BB;
pub const GET_PICTURE: u16 = 0xA9BC;
pub const GET_NEW_WINDOW: u16 = 0xA9BD;
pub const GET_RMENU: u16 = 0xA9BF;
pub const GET_NEW_MBAR: u16 = 0xA9C0;
pub const SYS_EDIT: u16 = 0xA9C2;
pub const SECONDS_TO_DATE: u16 = 0xA9C6;
pub const DATE_TO_SECONDS: u16 = 0xA9C7;
pub const SYS_BEEP: u16 = 0xA9C8;
pub const TE_INIT: u16 = 0xA9CC;
pub const TE_TEXT_BOX: u16 = 0xA9CE;
pub const PACK3: u16 = 0xA9EA;
pub const PACK4: u16 = 0xA9EB;
pub const PACK6: u16 = 0xA9ED;
pub const PACK7: u16 = 0xA9EE;
pub const LOAD_SEG: u16 = 0xA9F0;
pub const UNLOAD_SEG: u16 = 0xA9F1;
pub const EXIT_TO_SHELL: u16 = 0xA9F4;
pub const UNLOAD_SCRAP: u16 = 0xA9FA;
pub const LOAD_SCRAP: u16 = 0xA9FB;
pub const SND_DISPOSE_CHANNEL: u16 = 0xA801;
pub const SND_PLAY: u16 = 0xA805;
pub const SND_NEW_CHANNEL: u16 = 0xA807;
pub const NEW_CWINDOW: u16 = 0xAA45;
pub const RGB_FORE_COLOR: u16 = 0xAA14;
pub const RGB_BACK_COLOR: u16 = 0xAA15;
pub const INVERT_COLOR: u16 = 0xAA35;

const NAMES: &[(u16, &str)] = &[
    (OPEN, "Open"),
    (CLOSE, "Close"),
    (READ, "Read"),
    (WRITE, "Write"),
    (GET_VOL_INFO, "GetVolInfo"),
    (CREATE, "Create"),
    (DELETE, "Delete"),
    (OPEN_RF, "OpenRF"),
    (GET_FILE_INFO, "GetFileInfo"),
    (SET_FILE_INFO, "SetFileInfo"),
    (ALLOCATE, "Allocate"),
    (GET_EOF, "GetEOF"),
    (SET_EOF, "SetEOF"),
    (FREE_MEM, "FreeMem"),
    (DISPOSE_PTR, "DisposePtr"),
    (DISPOSE_HANDLE, "DisposeHandle"),
    (GET_HANDLE_SIZE, "GetHandleSize"),
    (RECOVER_HANDLE, "RecoverHandle"),
    (H_LOCK, "HLock"),
    (H_UNLOCK, "HUnlock"),
    (H_PURGE, "HPurge"),
    (H_NO_PURGE, "HNoPurge"),
    (SET_APPL_LIMIT, "SetApplLimit"),
    (BLOCK_MOVE, "BlockMove"),
    (BLOCK_MOVE_DATA, "BlockMoveData"),
    (POST_EVENT, "PostEvent"),
    (FLUSH_EVENTS, "FlushEvents"),
    (MORE_MASTERS, "MoreMasters"),
    (READ_DATE_TIME, "ReadDateTime"),
    (DELAY, "Delay"),
    (SET_GROW_ZONE, "SetGrowZone"),
    (MAX_APPL_ZONE, "MaxApplZone"),
    (SYS_ENVIRONS, "SysEnvirons"),
    (NEW_PTR, "NewPtr"),
    (NEW_PTR_SYS, "NewPtrSys"),
    (NEW_PTR_CLEAR, "NewPtrClear"),
    (NEW_PTR_SYS_CLEAR, "NewPtrSysClear"),
    (NEW_HANDLE, "NewHandle"),
    (NEW_HANDLE_CLEAR, "NewHandleClear"),
    (GET_TRAP_ADDRESS, "GetTrapAddress"),
    (SET_TRAP_ADDRESS, "SetTrapAddress"),
    (GET_OS_TRAP_ADDRESS, "GetOSTrapAddress"),
    (GET_TOOLBOX_TRAP_ADDRESS, "GetToolBoxTrapAddress"),
    (SET_TOOLBOX_TRAP_ADDRESS, "SetToolBoxTrapAddress"),
    (INIT_CURSOR, "InitCursor"),
    (SET_CURSOR, "SetCursor"),
    (HIDE_CURSOR, "HideCursor"),
    (BIT_AND, "BitAnd"),
    (BIT_SHIFT, "BitShift"),
    (BIT_TST, "BitTst"),
    (BIT_SET, "BitSet"),
    (WAIT_NEXT_EVENT, "WaitNextEvent"),
    (RANDOM, "Random"),
    (STUFF_HEX, "StuffHex"),
    (FIX_MUL, "FixMul"),
    (FIX_RATIO, "FixRatio"),
    (HI_WORD, "HiWord"),
    (LO_WORD, "LoWord"),
    (FIX_ROUND, "FixRound"),
    (INIT_GRAF, "InitGraf"),
    (OPEN_PORT, "OpenPort"),
    (LOCAL_TO_GLOBAL, "LocalToGlobal"),
    (GLOBAL_TO_LOCAL, "GlobalToLocal"),
    (GET_MOUSE, "GetMouse"),
    (SET_PORT, "SetPort"),
    (GET_PORT, "GetPort"),
    (SET_PORT_BITS, "SetPortBits"),
    (SET_ORIGIN, "SetOrigin"),
    (SET_CLIP, "SetClip"),
    (GET_CLIP, "GetClip"),
    (CLIP_RECT, "ClipRect"),
    (ADD_PT, "AddPt"),
    (SUB_PT, "SubPt"),
    (SET_PT, "SetPt"),
    (EQUAL_PT, "EqualPt"),
    (DRAW_CHAR, "DrawChar"),
    (DRAW_STRING, "DrawString"),
    (TEXT_FONT, "TextFont"),
    (TEXT_FACE, "TextFace"),
    (TEXT_SIZE, "TextSize"),
    (GET_FONT_INFO, "GetFontInfo"),
    (STRING_WIDTH, "StringWidth"),
    (CHAR_WIDTH, "CharWidth"),
    (LINE_TO, "LineTo"),
    (LINE, "Line"),
    (MOVE_TO, "MoveTo"),
    (MOVE, "Move"),
    (GET_PEN, "GetPen"),
    (PEN_SIZE, "PenSize"),
    (PEN_MODE, "PenMode"),
    (PEN_PAT, "PenPat"),
    (PEN_NORMAL, "PenNormal"),
    (UNIMPLEMENTED, "Unimplemented"),
    (FRAME_RECT, "FrameRect"),
    (PAINT_RECT, "PaintRect"),
    (ERASE_RECT, "EraseRect"),
    (INVERT_RECT, "InverRect"),
    (FILL_RECT, "FillRect"),
    (EQUAL_RECT, "EqualRect"),
    (SET_RECT, "SetRect"),
    (OFFSET_RECT, "OffsetRect"),
    (INSET_RECT, "InsetRect"),
    (SECT_RECT, "SectRect"),
    (PT2RECT, "Pt2Rect"),
    (PT_IN_RECT, "PtInRect"),
    (FRAME_ROUND_RECT, "FrameRoundRect"),
    (INVERT_ROUND_RECT, "InverRoundRect"),
    (PAINT_OVAL, "PaintOval"),
    (ERASE_OVAL, "EraseOval"),
    (FILL_OVAL, "FillOval"),
    (FILL_RGN, "FillRgn"),
    (NEW_RGN, "NewRgn"),
    (DISPOSE_RGN, "DisposeRgn"),
    (OPEN_RGN, "OpenRgn"),
    (CLOSE_RGN, "CloseRgn"),
    (PT_IN_RGN, "PtInRgn"),
    (RECT_IN_RGN, "RectInRgn"),
    (DRAW_PICTURE, "DrawPicture"),
    (INIT_FONTS, "InitFonts"),
    (GET_F_NAME, "GetFontName"),
    (GET_F_NUM, "GetFontNum"),
    (REAL_FONT, "RealFont"),
    (DRAG_GRAY_RGN, "DragGrayRgn"),
    (GET_WMGR_PORT, "GetWMgrPort"),
    (INIT_WINDOWS, "InitWindows"),
    (NEW_WINDOW, "NewWindow"),
    (DISPOSE_WINDOW, "DisposeWindow"),
    (SHOW_WINDOW, "ShowWindow"),
    (GET_WREF_CON, "GetWRefCon"),
    (SET_WREF_CON, "SetWRefCon"),
    (SET_WTITLE, "SetWTitle"),
    (MOVE_WINDOW, "MoveWindow"),
    (SELECT_WINDOW, "SelectWindow"),
    (BEGIN_UPDATE, "BeginUpDate"),
    (END_UPDATE, "EndUpDate"),
    (FRONT_WINDOW, "FrontWindow"),
    (DRAG_WINDOW, "DragWindow"),
    (INVAL_RECT, "InvalRect"),
    (VALID_RECT, "ValidRect"),
    (FIND_WINDOW, "FindWindow"),
    (INIT_MENUS, "InitMenus"),
    (INSERT_MENU, "InsertMenu"),
    (DRAW_MENU_BAR, "DrawMenuBar"),
    (HILITE_MENU, "HiliteMenu"),
    (ENABLE_ITEM, "EnableItem"),
    (DISABLE_ITEM, "DisableItem"),
    (SET_MENU_BAR, "SetMenuBar"),
    (MENU_SELECT, "MenuSelect"),
    (GET_MENU_ITEM_TEXT, "GetMenuItemText"),
    (CHECK_ITEM, "CheckItem"),
    (GET_MENU_HANDLE, "GetMenuHandle"),
    (PLOT_ICON, "PlotIcon"),
    (APPEND_RES_MENU, "AppendResMenu"),
    (COUNT_M_ITEMS, "CountMItems"),
    (GET_NEW_CONTROL, "GetNewControl"),
    (BUTTON, "Button"),
    (STILL_DOWN, "StillDown"),
    (TICK_COUNT, "TickCount"),
    (GET_KEYS, "GetKeys"),
    (GET_NEXT_EVENT, "GetNextEvent"),
    (INIT_DIALOGS, "InitDialogs"),
    (GET_NEW_DIALOG, "GetNewDialog"),
    (IS_DIALOG_EVENT, "IsDialogEvent"),
    (DIALOG_SELECT, "DialogSelect"),
    (DISPOSE_DIALOG, "DisposeDialog"),
    (STOP_ALERT, "StopAlert"),
    (PARAM_TEXT, "ParamText"),
    (GET_DIALOG_ITEM, "GetDialogItem"),
    (SET_DIALOG_ITEM, "SetDialogItem"),
    (MODAL_DIALOG, "ModalDialog"),
    (GET_RESOURCE, "GetResource"),
    (GET1_NAMED_RESOURCE, "Get1NamedResource"),
    (LOAD_RESOURCE, "LoadResource"),
    (RELEASE_RESOURCE, "ReleaseResource"),
    (SIZE_RSRC, "SizeRsrc"),
    (GET_RES_ATTRS, "GetResAttrs"),
    (CHANGED_RESOURCE, "ChangedResource"),
    (WRITE_RESOURCE, "WriteResource"),
    (SYSTEM_TASK, "SystemTask"),
    (GET_CURSOR, "GetCursor"),
    (GET_STRING, "GetString"),
    (GET_PICTURE, "GetPicture"),
    (GET_NEW_WINDOW, "GetNewWindow"),
    (GET_RMENU, "GetRMenu"),
    (GET_NEW_MBAR, "GetNewMBar"),
    (SYS_EDIT, "SysEdit"),
    (SECONDS_TO_DATE, "SecondsToDate"),
    (DATE_TO_SECONDS, "DateToSeconds"),
    (SYS_BEEP, "SysBeep"),
    (TE_INIT, "TEInit"),
    (TE_TEXT_BOX, "TETextBox"),
    (PACK3, "Pack3"),
    (PACK4, "Pack4"),
    (PACK7, "Pack7"),
    (LOAD_SEG, "LoadSeg"),
    (UNLOAD_SEG, "UnloadSeg"),
    (EXIT_TO_SHELL, "ExitToShell"),
    (UNLOAD_SCRAP, "UnloadScrap"),
    (SND_DISPOSE_CHANNEL, "SndDisposeChannel"),
    (SND_PLAY, "SndPlay"),
    (SND_NEW_CHANNEL, "SndNewChannel"),
    (NEW_CWINDOW, "NewCWindow"),
    (RGB_FORE_COLOR, "RGBForeColor"),
    (INVERT_COLOR, "InvertColor"),
];

/// The trap's conventional name, or a hex rendering for unknown opcodes.
pub fn trap_name(trap: u16) -> String {
    // Flag bits don't change the routine a Toolbox trap names.
    let canonical = if super::is_toolbox(trap) { trap & !(1 << 10) } else { trap };
    NAMES
        .iter()
        .find(|(opcode, _)| *opcode == canonical)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| format!("Trap(0x{:04x})", trap))
}
